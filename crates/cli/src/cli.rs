use std::net::SocketAddr;
use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

/// Help output colours matching cargo's.
fn cli_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
		.valid(AnsiColor::Cyan.on_default())
}

#[derive(Parser, Debug)]
#[command(name = "flowdev")]
#[command(about = "flowdev - run the front-end dev server behind a session-aware local front end")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: text (default), json, or ndjson
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Start the dev server and serve the project through a local front end
	Dev(DevArgs),

	/// Check whether a dev server answers on a port
	Probe {
		/// Port to probe
		#[arg(long)]
		port: u16,

		/// Probe timeout in milliseconds
		#[arg(long, default_value_t = 2_000)]
		timeout_ms: u64,
	},

	/// Ask a running dev server to shut down
	Stop {
		/// Port of the dev server
		#[arg(long)]
		port: u16,

		/// Request timeout in milliseconds
		#[arg(long, default_value_t = 2_000)]
		timeout_ms: u64,
	},
}

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Dev(_) => "dev",
			Commands::Probe { .. } => "probe",
			Commands::Stop { .. } => "stop",
		}
	}
}

#[derive(Args, Debug, Clone)]
pub struct DevArgs {
	/// Project directory containing package.json and flowdev.json
	#[arg(long, value_name = "DIR", default_value = ".")]
	pub project: PathBuf,

	/// Address the front end listens on
	#[arg(long, value_name = "ADDR", default_value = "127.0.0.1:8080")]
	pub listen: SocketAddr,

	/// Use a dev server that is already running on this port
	#[arg(long, value_name = "N")]
	pub port: Option<u16>,

	/// Detect readiness by probing HTTP instead of watching output
	#[arg(long)]
	pub probe_ready: bool,

	/// Run this command instead of the Node.js dev server; `{port}` is replaced
	/// with the allocated port
	#[arg(long, value_name = "CMD")]
	pub command: Option<String>,
}
