//! Port allocation and the port file used for restart reuse.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::TcpListener as StdTcpListener;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Asks the OS for a free ephemeral port on the loopback interface.
pub fn free_port() -> Result<u16> {
	let listener = StdTcpListener::bind(("127.0.0.1", 0)).map_err(Error::NoFreePort)?;
	let port = listener.local_addr().map_err(Error::NoFreePort)?.port();
	Ok(port)
}

/// Returns true if nothing is listening on `port` locally.
pub fn port_available(port: u16) -> bool {
	StdTcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Records the port of the running dev server for one project in this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortFile {
	path: PathBuf,
}

impl PortFile {
	/// Port file for `project_dir` owned by the current process, inside `state_dir`.
	pub fn for_project(state_dir: &Path, project_dir: &Path) -> Self {
		let project = canonicalize_or_self(project_dir.to_path_buf());
		let name = format!(
			"flowdev-devserver-{}-{}.port",
			std::process::id(),
			hash_hex(&project.to_string_lossy())
		);
		Self {
			path: state_dir.join(name),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Reads the recorded port. A missing or unparsable file reads as `None`.
	pub fn read(&self) -> Option<u16> {
		let content = std::fs::read_to_string(&self.path).ok()?;
		match content.trim().parse() {
			Ok(port) => Some(port),
			Err(_) => {
				debug!(target = "flowdev.devserver", path = %self.path.display(), "ignoring malformed port file");
				None
			}
		}
	}

	pub fn write(&self, port: u16) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(&self.path, port.to_string())?;
		Ok(())
	}

	/// Removes the file; a file that is already gone is not an error.
	pub fn remove(&self) {
		if let Err(e) = std::fs::remove_file(&self.path) {
			if e.kind() != std::io::ErrorKind::NotFound {
				debug!(target = "flowdev.devserver", path = %self.path.display(), error = %e, "failed to remove port file");
			}
		}
	}
}

fn canonicalize_or_self(path: PathBuf) -> PathBuf {
	path.canonicalize().unwrap_or(path)
}

fn hash_hex(input: &str) -> String {
	let mut hasher = DefaultHasher::new();
	input.hash(&mut hasher);
	format!("{:016x}", hasher.finish())
}
