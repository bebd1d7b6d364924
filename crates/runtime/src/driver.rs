//! Node.js discovery and project validation for the dev server.
//!
//! The dev server is a Node.js script installed in the project's
//! `node_modules`. Before launching it we need a runnable `node` and a project
//! that actually contains the script and its configuration.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::config::DevServerConfig;
use crate::error::{Error, Result};

/// Environment variable overriding Node.js discovery.
pub const NODE_EXE_ENV: &str = "FLOWDEV_NODE_EXE";

/// Get the path to a usable Node.js executable.
///
/// This function attempts to locate Node.js in the following order:
/// 1. `FLOWDEV_NODE_EXE` environment variable (runtime override)
/// 2. Project-local installation (`<project>/node/node`)
/// 3. `PATH` lookup
/// 4. Common install locations
///
/// An override that is not runnable falls back to the remaining candidates.
///
/// # Errors
///
/// Returns `Error::NodeNotFound` if no runnable executable is found.
pub fn get_node_executable(project_dir: &Path) -> Result<PathBuf> {
	if let Some(node) = std::env::var_os(NODE_EXE_ENV).map(PathBuf::from) {
		if let Some(node) =
			resolve_candidate_with_fallback(NODE_EXE_ENV, node, || find_node_executable(project_dir))
		{
			return Ok(node);
		}
		return Err(Error::NodeNotFound);
	}

	find_node_executable(project_dir)
}

fn resolve_candidate_with_fallback<F>(label: &str, node: PathBuf, find_node: F) -> Option<PathBuf>
where
	F: Fn() -> Result<PathBuf>,
{
	let usable = node_is_usable(&node);
	debug!(
		target = "flowdev.driver",
		source = label,
		node = %node.display(),
		usable,
		"node candidate"
	);
	if usable {
		return Some(node);
	}

	warn!(
		target = "flowdev.driver",
		source = label,
		node = %node.display(),
		"Node.js candidate is not runnable; trying fallback node"
	);

	let fallback_node = find_node().ok()?;
	if fallback_node == node {
		return None;
	}
	Some(fallback_node)
}

fn node_is_usable(node: &Path) -> bool {
	Command::new(node)
		.arg("--version")
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.status()
		.map(|status| status.success())
		.unwrap_or(false)
}

fn node_binary_name() -> &'static str {
	if cfg!(windows) { "node.exe" } else { "node" }
}

#[cfg(not(windows))]
const COMMON_NODE_LOCATIONS: &[&str] = &[
	"/usr/local/bin/node",
	"/usr/bin/node",
	"/opt/homebrew/bin/node",
	"/opt/local/bin/node",
];

#[cfg(windows)]
const COMMON_NODE_LOCATIONS: &[&str] = &[
	"C:\\Program Files\\nodejs\\node.exe",
	"C:\\Program Files (x86)\\nodejs\\node.exe",
];

/// Find the node executable in the project, PATH or common locations
fn find_node_executable(project_dir: &Path) -> Result<PathBuf> {
	find_node_in(project_dir, std::env::var_os("PATH"))
}

/// First runnable node among the project-local binary, every `node` on
/// `search_path`, and the common install locations.
fn find_node_in(project_dir: &Path, search_path: Option<OsString>) -> Result<PathBuf> {
	let local = project_dir.join("node").join(node_binary_name());
	let on_path = search_path
		.and_then(|paths| which::which_in_all(node_binary_name(), Some(paths), project_dir).ok())
		.into_iter()
		.flatten();

	std::iter::once(local)
		.chain(on_path)
		.chain(COMMON_NODE_LOCATIONS.iter().map(PathBuf::from))
		.filter(|path| path.exists())
		.find(|path| {
			let usable = node_is_usable(path);
			if !usable {
				debug!(target = "flowdev.driver", node = %path.display(), "skipping node that does not run");
			}
			usable
		})
		.ok_or(Error::NodeNotFound)
}

/// Files the dev server needs, resolved against the project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFiles {
	pub script: PathBuf,
	pub config: PathBuf,
}

/// Checks that the project can run the dev server.
///
/// # Errors
///
/// Returns `Error::InvalidProject` when the project directory is missing, the
/// server script is missing or not executable, or the server configuration
/// cannot be read.
pub fn validate_project(project_dir: &Path, config: &DevServerConfig) -> Result<ServerFiles> {
	if !project_dir.is_dir() {
		warn!(target = "flowdev.driver", dir = %project_dir.display(), "no project folder exists");
		return Err(Error::InvalidProject(
			"the target execution folder doesn't exist.".to_string(),
		));
	}

	let script = project_dir.join(&config.server_script);
	if !script.exists() {
		warn!(
			target = "flowdev.driver",
			script = %script.display(),
			"dev server script doesn't exist. Did you run `npm install`?"
		);
		return Err(Error::InvalidProject(format!(
			"'{}' doesn't exist. `npm install` has not run or failed.",
			script.display()
		)));
	}
	if !is_executable(&script) {
		warn!(
			target = "flowdev.driver",
			script = %script.display(),
			"dev server script is not an executable. Did you run `npm install`?"
		);
		return Err(Error::InvalidProject(format!(
			"'{}' is not an executable. `npm install` has not run or failed.",
			script.display()
		)));
	}

	let server_config = project_dir.join(&config.server_config);
	if std::fs::File::open(&server_config).is_err() {
		warn!(
			target = "flowdev.driver",
			config = %server_config.display(),
			"dev server configuration is not found or is not readable"
		);
		return Err(Error::InvalidProject(format!(
			"'{}' doesn't exist or is not readable.",
			server_config.display()
		)));
	}

	Ok(ServerFiles {
		script,
		config: server_config,
	})
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
	use std::os::unix::fs::PermissionsExt;

	std::fs::metadata(path)
		.map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
		.unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
	path.is_file()
}

#[cfg(test)]
mod tests {
	use std::fs;
	#[cfg(unix)]
	use std::os::unix::fs::PermissionsExt;

	use tempfile::TempDir;

	use super::*;

	#[cfg(unix)]
	fn write_mock_node(path: &Path, exit_code: i32) {
		let script = format!("#!/bin/sh\n[ \"$1\" = \"--version\" ]\nexit {}\n", exit_code);
		fs::write(path, script).unwrap();
		let mut perms = fs::metadata(path).unwrap().permissions();
		perms.set_mode(0o755);
		fs::set_permissions(path, perms).unwrap();
	}

	#[cfg(unix)]
	fn write_project(dir: &Path, script_mode: u32) {
		let script = dir.join(crate::config::DEFAULT_SERVER_SCRIPT);
		fs::create_dir_all(script.parent().unwrap()).unwrap();
		fs::write(&script, "// dev server").unwrap();
		let mut perms = fs::metadata(&script).unwrap().permissions();
		perms.set_mode(script_mode);
		fs::set_permissions(&script, perms).unwrap();
		fs::write(dir.join(crate::config::DEFAULT_SERVER_CONFIG), "module.exports = {};").unwrap();
	}

	#[test]
	fn test_find_node_executable() {
		let temp = TempDir::new().unwrap();
		match find_node_executable(temp.path()) {
			Ok(node_path) => assert!(node_path.exists()),
			Err(e) => println!("Node.js not found (expected if Node.js not installed): {:?}", e),
		}
	}

	#[cfg(unix)]
	#[test]
	fn test_project_local_node_is_preferred() {
		let temp = TempDir::new().unwrap();
		fs::create_dir_all(temp.path().join("node")).unwrap();
		let local = temp.path().join("node").join("node");
		write_mock_node(&local, 0);

		assert_eq!(find_node_executable(temp.path()).unwrap(), local);
	}

	#[cfg(unix)]
	#[test]
	fn test_broken_node_on_path_is_skipped() {
		let project = TempDir::new().unwrap();
		let broken_dir = TempDir::new().unwrap();
		let working_dir = TempDir::new().unwrap();
		let broken = broken_dir.path().join("node");
		let working = working_dir.path().join("node");
		write_mock_node(&broken, 1);
		write_mock_node(&working, 0);

		let search_path = std::env::join_paths([broken_dir.path(), working_dir.path()]).unwrap();
		assert_eq!(find_node_in(project.path(), Some(search_path)).unwrap(), working);
	}

	#[cfg(unix)]
	#[test]
	fn test_only_broken_node_on_path_is_never_returned() {
		let project = TempDir::new().unwrap();
		let broken_dir = TempDir::new().unwrap();
		let broken = broken_dir.path().join("node");
		write_mock_node(&broken, 1);

		let search_path = std::env::join_paths([broken_dir.path()]).unwrap();
		match find_node_in(project.path(), Some(search_path)) {
			Ok(node) => {
				assert_ne!(node, broken);
				assert!(node_is_usable(&node));
			}
			Err(e) => assert!(matches!(e, Error::NodeNotFound)),
		}
	}

	#[cfg(unix)]
	#[test]
	fn test_broken_project_local_node_falls_through() {
		let project = TempDir::new().unwrap();
		fs::create_dir_all(project.path().join("node")).unwrap();
		write_mock_node(&project.path().join("node").join("node"), 1);
		let working_dir = TempDir::new().unwrap();
		let working = working_dir.path().join("node");
		write_mock_node(&working, 0);

		let search_path = std::env::join_paths([working_dir.path()]).unwrap();
		assert_eq!(find_node_in(project.path(), Some(search_path)).unwrap(), working);
	}

	#[cfg(unix)]
	#[test]
	fn test_resolve_candidate_falls_back_to_second_node() {
		let temp = TempDir::new().unwrap();
		let candidate = temp.path().join("candidate-node");
		let fallback = temp.path().join("fallback-node");
		write_mock_node(&candidate, 1);
		write_mock_node(&fallback, 0);

		let resolved = resolve_candidate_with_fallback("test", candidate, || Ok(fallback.clone()));
		assert_eq!(resolved, Some(fallback));
	}

	#[cfg(unix)]
	#[test]
	fn test_resolve_candidate_keeps_first_node_when_usable() {
		let temp = TempDir::new().unwrap();
		let candidate = temp.path().join("candidate-node");
		write_mock_node(&candidate, 0);

		let resolved = resolve_candidate_with_fallback("test", candidate.clone(), || {
			panic!("fallback should not be consulted when candidate node is usable");
		});
		assert_eq!(resolved, Some(candidate));
	}

	#[cfg(unix)]
	#[test]
	fn test_resolve_candidate_returns_none_when_fallback_unavailable() {
		let temp = TempDir::new().unwrap();
		let candidate = temp.path().join("candidate-node");
		write_mock_node(&candidate, 1);

		let resolved = resolve_candidate_with_fallback("test", candidate, || Err(Error::NodeNotFound));
		assert!(resolved.is_none());
	}

	#[cfg(unix)]
	#[test]
	fn test_validate_project_accepts_complete_project() {
		let temp = TempDir::new().unwrap();
		write_project(temp.path(), 0o755);

		let files = validate_project(temp.path(), &DevServerConfig::default()).unwrap();
		assert!(files.script.ends_with(crate::config::DEFAULT_SERVER_SCRIPT));
		assert!(files.config.ends_with(crate::config::DEFAULT_SERVER_CONFIG));
	}

	#[test]
	fn test_validate_project_rejects_missing_folder() {
		let temp = TempDir::new().unwrap();
		let missing = temp.path().join("missing");

		let err = validate_project(&missing, &DevServerConfig::default()).unwrap_err();
		assert!(err.to_string().contains("execution folder doesn't exist"));
	}

	#[test]
	fn test_validate_project_rejects_missing_script() {
		let temp = TempDir::new().unwrap();
		fs::write(temp.path().join(crate::config::DEFAULT_SERVER_CONFIG), "").unwrap();

		let err = validate_project(temp.path(), &DevServerConfig::default()).unwrap_err();
		assert!(matches!(err, Error::InvalidProject(_)));
		assert!(err.to_string().contains("`npm install` has not run"));
	}

	#[cfg(unix)]
	#[test]
	fn test_validate_project_rejects_non_executable_script() {
		let temp = TempDir::new().unwrap();
		write_project(temp.path(), 0o644);

		let err = validate_project(temp.path(), &DevServerConfig::default()).unwrap_err();
		assert!(err.to_string().contains("is not an executable"));
	}

	#[cfg(unix)]
	#[test]
	fn test_validate_project_rejects_missing_server_config() {
		let temp = TempDir::new().unwrap();
		write_project(temp.path(), 0o755);
		fs::remove_file(temp.path().join(crate::config::DEFAULT_SERVER_CONFIG)).unwrap();

		let err = validate_project(temp.path(), &DevServerConfig::default()).unwrap_err();
		assert!(err.to_string().contains("is not readable"));
	}
}
