//! Dev server settings.
//!
//! Settings live in an optional `flowdev.json` next to the project's
//! `package.json`. Every key is optional; missing keys take the defaults
//! below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the per-project settings file.
pub const CONFIG_FILE: &str = "flowdev.json";

/// Default location of the dev server script inside the project.
pub const DEFAULT_SERVER_SCRIPT: &str = "node_modules/webpack-dev-server/bin/webpack-dev-server.js";

/// Default dev server configuration file inside the project.
pub const DEFAULT_SERVER_CONFIG: &str = "webpack.config.js";

/// Written by the dev server when a compilation succeeds.
pub const DEFAULT_SUCCESS_PATTERN: &str = ": Compiled.";

/// Written by the dev server when a compilation fails.
pub const DEFAULT_FAILURE_PATTERN: &str = ": Failed to compile.";

/// Settings for launching and talking to the dev server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DevServerConfig {
	/// Production deployments never start a dev server.
	pub production_mode: bool,
	/// Master switch for the dev server.
	pub enable_dev_server: bool,
	/// Keep the server running across application restarts.
	pub reuse_dev_server: bool,
	/// Dev server script, relative to the project directory.
	pub server_script: PathBuf,
	/// Dev server configuration file, relative to the project directory.
	pub server_config: PathBuf,
	/// Extra command line options, whitespace separated.
	pub server_options: String,
	/// Regex matched against output lines to detect a successful compilation.
	pub success_pattern: String,
	/// Regex matched against output lines to detect a failed compilation.
	pub failure_pattern: String,
	/// Upper bound for waiting on readiness.
	pub ready_timeout_ms: u64,
	/// Connect/read timeout for forwarded requests.
	pub request_timeout_ms: u64,
	/// Timeout for a single liveness probe.
	pub probe_timeout_ms: u64,
	/// Requests below this path prefix are served by the dev server.
	pub asset_prefix: String,
	/// Port of a dev server that is already running.
	pub running_port: Option<u16>,
}

impl Default for DevServerConfig {
	fn default() -> Self {
		Self {
			production_mode: false,
			enable_dev_server: true,
			reuse_dev_server: true,
			server_script: PathBuf::from(DEFAULT_SERVER_SCRIPT),
			server_config: PathBuf::from(DEFAULT_SERVER_CONFIG),
			server_options: String::new(),
			success_pattern: DEFAULT_SUCCESS_PATTERN.to_string(),
			failure_pattern: DEFAULT_FAILURE_PATTERN.to_string(),
			ready_timeout_ms: 60_000,
			request_timeout_ms: 120_000,
			probe_timeout_ms: 2_000,
			asset_prefix: "/VAADIN/".to_string(),
			running_port: None,
		}
	}
}

impl DevServerConfig {
	/// Loads settings from a JSON file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)?;
		serde_json::from_str(&content).map_err(|source| Error::Config {
			path: path.to_path_buf(),
			source,
		})
	}

	/// Loads `flowdev.json` from the project directory, or defaults if absent.
	pub fn load_from_project(project_dir: &Path) -> Result<Self> {
		let path = project_dir.join(CONFIG_FILE);
		if path.is_file() {
			Self::load(&path)
		} else {
			Ok(Self::default())
		}
	}

	/// Whether `start` should bring up a dev server at all.
	pub fn dev_server_enabled(&self) -> bool {
		!self.production_mode && self.enable_dev_server
	}

	pub fn server_options(&self) -> Vec<String> {
		self.server_options
			.split_whitespace()
			.map(str::to_string)
			.collect()
	}

	pub fn success_regex(&self) -> Result<Regex> {
		Ok(Regex::new(&self.success_pattern)?)
	}

	pub fn failure_regex(&self) -> Result<Regex> {
		Ok(Regex::new(&self.failure_pattern)?)
	}

	pub fn ready_timeout(&self) -> Duration {
		Duration::from_millis(self.ready_timeout_ms)
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}

	pub fn probe_timeout(&self) -> Duration {
		Duration::from_millis(self.probe_timeout_ms)
	}

	/// Returns true if the request path should be forwarded to the dev server.
	pub fn is_dev_mode_request(&self, path: &str) -> bool {
		path.starts_with(&self.asset_prefix)
	}
}
