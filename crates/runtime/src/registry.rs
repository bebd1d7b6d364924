//! The dev server registry: owns at most one running dev server.
//!
//! Start and stop transitions are serialized on the registry slot. A server
//! that outlives its registry (application restart) is found again through
//! the port file and reused instead of spawning a duplicate.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::DevServerConfig;
use crate::error::{Error, Result};
use crate::port::{PortFile, free_port};
use crate::process::{DevServerLauncher, DevServerProcess, LaunchRequest, NodeLauncher};
use crate::proxy::{self, ProxyRequest, ProxyResponse};
use crate::readiness::{self, Readiness, ReadinessState, ReadySignal};

/// A running dev server.
pub struct DevServerHandle {
	port: u16,
	reused: bool,
	project_dir: PathBuf,
	process: Mutex<Option<Box<dyn DevServerProcess>>>,
	readiness: Arc<ReadinessState>,
	client: Client,
	probe_timeout: Duration,
}

impl fmt::Debug for DevServerHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DevServerHandle")
			.field("port", &self.port)
			.field("reused", &self.reused)
			.field("project_dir", &self.project_dir)
			.field("readiness", &self.readiness.current())
			.finish_non_exhaustive()
	}
}

impl DevServerHandle {
	pub fn port(&self) -> u16 {
		self.port
	}

	/// True when this handle attached to a server that was already running.
	pub fn is_reused(&self) -> bool {
		self.reused
	}

	pub fn project_dir(&self) -> &Path {
		&self.project_dir
	}

	pub fn readiness(&self) -> Readiness {
		self.readiness.current()
	}

	/// Requests can be forwarded.
	pub fn is_ready(&self) -> bool {
		self.readiness.current().is_serving()
	}

	/// Output of the last failed compilation, cleared by a later success.
	pub fn failed_output(&self) -> Option<String> {
		self.readiness.failed_output()
	}

	/// Waits until the server is ready or has failed to compile.
	///
	/// # Errors
	///
	/// `Error::ExitedPrematurely` if the server went away first,
	/// `Error::Timeout` if the deadline passes.
	pub async fn wait_ready(&self, timeout: Duration) -> Result<Readiness> {
		self.readiness.wait(timeout).await
	}

	/// Whether the backing process is still alive. Reused servers have no
	/// process of ours and count as running until they exit.
	pub async fn is_running(&self) -> bool {
		match self.process.lock().await.as_mut() {
			Some(process) => process.is_alive(),
			None => self.readiness.current() != Readiness::Exited,
		}
	}

	async fn terminate(&self) -> Result<()> {
		proxy::send_stop(&self.client, self.port, self.probe_timeout).await;
		let process = self.process.lock().await.take();
		if let Some(mut process) = process {
			debug!(target = "flowdev.devserver", port = self.port, pid = ?process.id(), "killing dev server");
			process.kill().await?;
		}
		self.readiness.set(Readiness::Exited);
		Ok(())
	}
}

/// Owns the dev server for one application.
pub struct DevServerRegistry {
	slot: Mutex<Option<Arc<DevServerHandle>>>,
	launcher: Arc<dyn DevServerLauncher>,
	state_dir: PathBuf,
}

impl fmt::Debug for DevServerRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DevServerRegistry")
			.field("state_dir", &self.state_dir)
			.finish_non_exhaustive()
	}
}

impl Default for DevServerRegistry {
	fn default() -> Self {
		Self::new(Arc::new(NodeLauncher))
	}
}

impl DevServerRegistry {
	/// Registry keeping its port files in the OS temp directory.
	pub fn new(launcher: Arc<dyn DevServerLauncher>) -> Self {
		Self::with_state_dir(launcher, std::env::temp_dir())
	}

	pub fn with_state_dir(launcher: Arc<dyn DevServerLauncher>, state_dir: impl Into<PathBuf>) -> Self {
		Self {
			slot: Mutex::new(None),
			launcher,
			state_dir: state_dir.into(),
		}
	}

	pub fn state_dir(&self) -> &Path {
		&self.state_dir
	}

	/// Starts the dev server, or returns the one already running.
	///
	/// Returns `Ok(None)` when the configuration disables the dev server.
	///
	/// # Errors
	///
	/// Fails if no port can be allocated, the project is invalid, the process
	/// cannot be launched, or `running_port` is set but nothing answers there.
	pub async fn start(
		&self,
		config: &DevServerConfig,
		project_dir: &Path,
		signal: ReadySignal,
	) -> Result<Option<Arc<DevServerHandle>>> {
		if !config.dev_server_enabled() {
			debug!(
				target = "flowdev.devserver",
				production_mode = config.production_mode,
				enable_dev_server = config.enable_dev_server,
				"dev server disabled"
			);
			return Ok(None);
		}

		let mut slot = self.slot.lock().await;
		if let Some(handle) = slot.as_ref() {
			debug!(target = "flowdev.devserver", port = handle.port, "dev server already started");
			return Ok(Some(Arc::clone(handle)));
		}

		let client = proxy::client(config.request_timeout())?;
		let probe_client = proxy::client(config.probe_timeout())?;
		let port_file = PortFile::for_project(&self.state_dir, project_dir);

		let reuse_port = if let Some(port) = config.running_port {
			if !proxy::probe(&probe_client, port).await {
				return Err(Error::PortNotResponding(port));
			}
			Some(port)
		} else if let Some(port) = port_file.read() {
			if proxy::probe(&probe_client, port).await {
				Some(port)
			} else {
				warn!(
					target = "flowdev.devserver",
					port,
					"dev server port is defined but it's not working properly, starting a new one"
				);
				port_file.remove();
				None
			}
		} else {
			None
		};

		let handle = match reuse_port {
			Some(port) => {
				info!(target = "flowdev.devserver", port, "reusing dev server");
				DevServerHandle {
					port,
					reused: true,
					project_dir: project_dir.to_path_buf(),
					process: Mutex::new(None),
					readiness: ReadinessState::new(Readiness::Ready),
					client,
					probe_timeout: config.probe_timeout(),
				}
			}
			None => self.launch(config, project_dir, signal, client, &port_file)?,
		};

		let handle = Arc::new(handle);
		*slot = Some(Arc::clone(&handle));
		Ok(Some(handle))
	}

	fn launch(
		&self,
		config: &DevServerConfig,
		project_dir: &Path,
		signal: ReadySignal,
		client: Client,
		port_file: &PortFile,
	) -> Result<DevServerHandle> {
		let port = free_port()?;
		let mut process = self.launcher.launch(&LaunchRequest {
			project_dir,
			port,
			config,
		})?;

		info!(target = "flowdev.devserver", port, pid = ?process.id(), "dev server launched");

		let readiness = ReadinessState::new(Readiness::Pending);
		readiness::spawn_watchers(&readiness, &signal, process.take_output(), port);

		if let Err(e) = port_file.write(port) {
			warn!(target = "flowdev.devserver", error = %e, path = %port_file.path().display(), "failed to write port file");
		}

		Ok(DevServerHandle {
			port,
			reused: false,
			project_dir: project_dir.to_path_buf(),
			process: Mutex::new(Some(process)),
			readiness,
			client,
			probe_timeout: config.probe_timeout(),
		})
	}

	/// The current handle, if a server was started.
	pub async fn handle(&self) -> Option<Arc<DevServerHandle>> {
		self.slot.lock().await.clone()
	}

	/// Stops the dev server and forgets it. Does nothing if none is running.
	pub async fn stop(&self) -> Result<()> {
		let mut slot = self.slot.lock().await;
		let Some(handle) = slot.take() else {
			debug!(target = "flowdev.devserver", "no dev server to stop");
			return Ok(());
		};

		info!(target = "flowdev.devserver", port = handle.port, "stopping dev server");
		let result = handle.terminate().await;
		PortFile::for_project(&self.state_dir, &handle.project_dir).remove();
		result
	}

	/// Forgets the dev server without stopping it, as an application restart
	/// would. The next `start` finds and reuses it.
	pub async fn detach(&self) -> Option<Arc<DevServerHandle>> {
		let handle = self.slot.lock().await.take();
		if let Some(handle) = &handle {
			debug!(target = "flowdev.devserver", port = handle.port, "detached dev server");
		}
		handle
	}

	/// Application teardown: keep the server for the next start when reuse
	/// is enabled, stop it otherwise.
	pub async fn shutdown(&self, config: &DevServerConfig) -> Result<()> {
		if config.reuse_dev_server {
			if let Some(handle) = self.detach().await {
				info!(target = "flowdev.devserver", port = handle.port, "leaving dev server running for reuse");
			}
			Ok(())
		} else {
			self.stop().await
		}
	}

	/// Process exit: stops a server this registry launched and forgets one it
	/// only reused. A launched server is owned by this process and must not
	/// outlive it.
	pub async fn release(&self) -> Result<()> {
		let reused = match self.handle().await {
			Some(handle) => handle.reused,
			None => return Ok(()),
		};
		if reused {
			if let Some(handle) = self.detach().await {
				info!(target = "flowdev.devserver", port = handle.port, "leaving reused dev server running");
			}
			Ok(())
		} else {
			self.stop().await
		}
	}

	/// Forwards a request to the dev server.
	///
	/// `None` means "not handled": no server, not ready yet, unreachable, or
	/// the server answered 404.
	pub async fn forward(&self, request: ProxyRequest) -> Option<ProxyResponse> {
		let handle = self.handle().await?;
		if !handle.is_ready() {
			debug!(target = "flowdev.devserver", readiness = ?handle.readiness(), path = %request.path, "dev server not ready");
			return None;
		}
		if !handle.is_running().await {
			debug!(target = "flowdev.devserver", port = handle.port, "dev server process is gone");
			return None;
		}
		proxy::forward(&handle.client, handle.port, request).await
	}
}
