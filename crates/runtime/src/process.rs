//! Dev server process management
//!
//! Launching is behind the [`DevServerLauncher`] trait so the registry does
//! not care whether the server is the project's Node.js dev server, an
//! arbitrary command, or an in-process stand-in.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tracing::info;

use crate::config::DevServerConfig;
use crate::driver::{get_node_executable, validate_project};
use crate::error::{Error, Result};

/// Output stream of a launched dev server.
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed future returned by [`DevServerProcess::kill`].
pub type KillFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Everything a launcher needs to start a dev server.
#[derive(Debug, Clone)]
pub struct LaunchRequest<'a> {
	pub project_dir: &'a Path,
	pub port: u16,
	pub config: &'a DevServerConfig,
}

/// A running dev server process.
pub trait DevServerProcess: Send {
	/// OS process id, if there is one.
	fn id(&self) -> Option<u32>;

	/// Returns true while the process has not exited.
	fn is_alive(&mut self) -> bool;

	/// Takes the process output streams. Subsequent calls return nothing.
	fn take_output(&mut self) -> Vec<OutputStream>;

	/// Terminates the process and waits briefly for it to exit.
	fn kill(&mut self) -> KillFuture<'_>;
}

/// Starts dev server processes.
pub trait DevServerLauncher: Send + Sync {
	fn launch(&self, request: &LaunchRequest<'_>) -> Result<Box<dyn DevServerProcess>>;
}

/// Launches the project's Node.js dev server:
/// `node <script> --config <config> --port <port> [options...]`.
#[derive(Debug, Clone, Default)]
pub struct NodeLauncher;

impl DevServerLauncher for NodeLauncher {
	fn launch(&self, request: &LaunchRequest<'_>) -> Result<Box<dyn DevServerProcess>> {
		let files = validate_project(request.project_dir, request.config)?;
		let node = get_node_executable(request.project_dir)?;

		let mut cmd = Command::new(&node);
		cmd.arg(&files.script)
			.arg("--config")
			.arg(&files.config)
			.arg("--port")
			.arg(request.port.to_string())
			.args(request.config.server_options())
			.current_dir(request.project_dir);

		info!(
			target = "flowdev.devserver",
			port = request.port,
			dir = %request.project_dir.display(),
			node = %node.display(),
			script = %files.script.display(),
			"Starting dev server"
		);

		Ok(Box::new(ChildProcess::spawn(cmd)?))
	}
}

/// Launches an arbitrary command. Arguments equal to or containing `{port}`
/// have the allocated port substituted.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
	program: PathBuf,
	args: Vec<String>,
}

impl CommandLauncher {
	pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
		Self {
			program: program.into(),
			args,
		}
	}

	/// Splits a command line on whitespace; the first word is the program.
	pub fn parse(command_line: &str) -> Result<Self> {
		let mut words = command_line.split_whitespace().map(str::to_string);
		let program = words
			.next()
			.ok_or_else(|| Error::LaunchFailed("empty dev server command".to_string()))?;
		Ok(Self::new(program, words.collect()))
	}

	pub fn args_for_port(&self, port: u16) -> Vec<String> {
		let port = port.to_string();
		self.args.iter().map(|arg| arg.replace("{port}", &port)).collect()
	}
}

impl DevServerLauncher for CommandLauncher {
	fn launch(&self, request: &LaunchRequest<'_>) -> Result<Box<dyn DevServerProcess>> {
		if !request.project_dir.is_dir() {
			return Err(Error::InvalidProject(
				"the target execution folder doesn't exist.".to_string(),
			));
		}

		let mut cmd = Command::new(&self.program);
		cmd.args(self.args_for_port(request.port))
			.env("PORT", request.port.to_string())
			.current_dir(request.project_dir);

		info!(
			target = "flowdev.devserver",
			port = request.port,
			dir = %request.project_dir.display(),
			program = %self.program.display(),
			"Starting dev server command"
		);

		Ok(Box::new(ChildProcess::spawn(cmd)?))
	}
}

/// A dev server running as a child process with piped output.
#[derive(Debug)]
pub struct ChildProcess {
	child: Child,
}

impl ChildProcess {
	/// Spawns the command with stdout and stderr piped and stdin closed.
	///
	/// # Errors
	///
	/// Returns `Error::LaunchFailed` if the process cannot be spawned.
	pub fn spawn(mut cmd: Command) -> Result<Self> {
		cmd.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped());

		let child = cmd
			.spawn()
			.map_err(|e| Error::LaunchFailed(format!("Failed to spawn process: {}", e)))?;

		Ok(Self { child })
	}
}

impl DevServerProcess for ChildProcess {
	fn id(&self) -> Option<u32> {
		self.child.id()
	}

	fn is_alive(&mut self) -> bool {
		matches!(self.child.try_wait(), Ok(None))
	}

	fn take_output(&mut self) -> Vec<OutputStream> {
		let mut streams: Vec<OutputStream> = Vec::new();
		if let Some(stdout) = self.child.stdout.take() {
			streams.push(Box::new(stdout));
		}
		if let Some(stderr) = self.child.stderr.take() {
			streams.push(Box::new(stderr));
		}
		streams
	}

	fn kill(&mut self) -> KillFuture<'_> {
		Box::pin(async move {
			#[cfg(windows)]
			{
				drop(self.child.stdout.take());
				drop(self.child.stderr.take());
			}

			if !self.is_alive() {
				return Ok(());
			}

			self.child
				.kill()
				.await
				.map_err(|e| Error::LaunchFailed(format!("Failed to kill process: {}", e)))?;

			let _ = tokio::time::timeout(std::time::Duration::from_millis(500), self.child.wait()).await;
			Ok(())
		})
	}
}
