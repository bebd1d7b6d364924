mod dev;
mod probe;

use anyhow::Result;

use crate::cli::{Cli, Commands};
use crate::output::{ErrorCode, OutputFormat};

pub async fn dispatch(cli: Cli, format: OutputFormat) -> Result<()> {
	match cli.command {
		Commands::Dev(args) => dev::execute(args, format).await,
		Commands::Probe { port, timeout_ms } => probe::probe(port, timeout_ms, format).await,
		Commands::Stop { port, timeout_ms } => probe::stop(port, timeout_ms, format).await,
	}
}

/// Maps a command failure to the code reported in the result envelope.
pub fn error_code(err: &anyhow::Error) -> ErrorCode {
	for cause in err.chain() {
		if let Some(err) = cause.downcast_ref::<flowdev_runtime::Error>() {
			return match err {
				flowdev_runtime::Error::PortNotResponding(_) => ErrorCode::NotResponding,
				flowdev_runtime::Error::Config { .. } | flowdev_runtime::Error::Pattern(_) => ErrorCode::InvalidInput,
				err if err.is_launch_failure() || err.is_timeout() => ErrorCode::DevServerFailed,
				_ => ErrorCode::Internal,
			};
		}
		if cause.downcast_ref::<flowdev::Error>().is_some() {
			return ErrorCode::Internal;
		}
	}
	ErrorCode::Internal
}
