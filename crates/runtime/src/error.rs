//! Error types for the dev server runtime.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing the dev server.
#[derive(Debug, Error)]
pub enum Error {
	/// Node.js executable was not found.
	#[error("Node.js executable not found. Install Node.js or set FLOWDEV_NODE_EXE.")]
	NodeNotFound,

	/// The project is missing something the dev server needs.
	#[error("Couldn't start dev server because {0}")]
	InvalidProject(String),

	/// Failed to launch the dev server process.
	#[error("Failed to launch dev server: {0}")]
	LaunchFailed(String),

	/// The dev server process exited before reporting readiness.
	#[error("Dev server exited prematurely")]
	ExitedPrematurely,

	/// A port was given for an already running server, but nothing answers there.
	#[error("Dev server port '{0}' is defined but it's not working properly")]
	PortNotResponding(u16),

	/// No ephemeral port could be allocated.
	#[error("Unable to find a free port for running the dev server: {0}")]
	NoFreePort(#[source] std::io::Error),

	/// Configuration file could not be loaded.
	#[error("Invalid dev server configuration in {path}: {source}")]
	Config {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	/// Output pattern failed to compile.
	#[error("Invalid output pattern: {0}")]
	Pattern(#[from] regex::Error),

	/// Timeout waiting for an operation.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// HTTP client error.
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl Error {
	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout(_))
	}

	/// Returns true if the error happened while bringing the server up.
	pub fn is_launch_failure(&self) -> bool {
		matches!(
			self,
			Error::NodeNotFound
				| Error::InvalidProject(_)
				| Error::LaunchFailed(_)
				| Error::ExitedPrematurely
				| Error::PortNotResponding(_)
				| Error::NoFreePort(_)
		)
	}
}
