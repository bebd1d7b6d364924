//! Readiness detection for the dev server.
//!
//! A server is ready either when its output matches the success pattern or,
//! for servers that print nothing useful, when it starts answering HTTP.

use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{Level, debug, error, info, warn};

use crate::config::DevServerConfig;
use crate::error::{Error, Result};
use crate::process::OutputStream;
use crate::proxy;

static ANSI_COLOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\[[;\d]*m").expect("valid ANSI pattern"));

/// Readiness state of a dev server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
	/// Still starting or compiling.
	Pending,
	/// Compiled and serving.
	Ready,
	/// The last compilation failed. The server still answers requests.
	CompileFailed,
	/// All output streams closed; the process is gone.
	Exited,
}

impl Readiness {
	/// Requests can be forwarded in this state.
	pub fn is_serving(self) -> bool {
		matches!(self, Readiness::Ready | Readiness::CompileFailed)
	}
}

/// How readiness is detected.
#[derive(Debug, Clone)]
pub enum ReadySignal {
	/// Match output lines against success and failure patterns.
	Output { success: Regex, failure: Regex },
	/// Poll `GET /` until the server answers.
	Probe { interval: Duration },
}

impl ReadySignal {
	/// Output patterns taken from the configuration.
	pub fn from_config(config: &DevServerConfig) -> Result<Self> {
		Ok(ReadySignal::Output {
			success: config.success_regex()?,
			failure: config.failure_regex()?,
		})
	}

	pub fn probe() -> Self {
		ReadySignal::Probe {
			interval: Duration::from_millis(100),
		}
	}
}

/// Shared readiness state of one dev server.
#[derive(Debug)]
pub(crate) struct ReadinessState {
	tx: watch::Sender<Readiness>,
	failed_output: Mutex<Option<String>>,
}

impl ReadinessState {
	pub(crate) fn new(initial: Readiness) -> Arc<Self> {
		let (tx, _rx) = watch::channel(initial);
		Arc::new(Self {
			tx,
			failed_output: Mutex::new(None),
		})
	}

	pub(crate) fn current(&self) -> Readiness {
		*self.tx.borrow()
	}

	pub(crate) fn failed_output(&self) -> Option<String> {
		self.failed_output.lock().clone()
	}

	pub(crate) fn set(&self, state: Readiness) {
		self.tx.send_if_modified(|current| {
			if *current == state {
				return false;
			}
			*current = state;
			true
		});
	}

	fn compiled(&self) {
		*self.failed_output.lock() = None;
		self.set(Readiness::Ready);
	}

	fn compile_failed(&self, output: String) {
		*self.failed_output.lock() = Some(output);
		self.set(Readiness::CompileFailed);
	}

	/// Waits until the state leaves `Pending`.
	pub(crate) async fn wait(&self, timeout: Duration) -> Result<Readiness> {
		let mut rx = self.tx.subscribe();
		let waited = tokio::time::timeout(timeout, rx.wait_for(|state| *state != Readiness::Pending)).await;
		match waited {
			Err(_) => Err(Error::Timeout(format!(
				"dev server not ready after {}ms",
				timeout.as_millis()
			))),
			Ok(Err(_)) => Err(Error::ExitedPrematurely),
			Ok(Ok(state)) => match *state {
				Readiness::Exited => Err(Error::ExitedPrematurely),
				other => Ok(other),
			},
		}
	}
}

/// Starts readiness detection for a freshly launched server.
///
/// Output streams are always drained and mirrored to the log; when every
/// stream has closed the state becomes `Exited`.
pub(crate) fn spawn_watchers(state: &Arc<ReadinessState>, signal: &ReadySignal, streams: Vec<OutputStream>, port: u16) {
	let patterns = match signal {
		ReadySignal::Output { success, failure } => Some((success.clone(), failure.clone())),
		ReadySignal::Probe { interval } => {
			tokio::spawn(poll_until_answering(Arc::clone(state), port, *interval));
			None
		}
	};

	let watcher = Arc::new(OutputWatcher {
		state: Arc::clone(state),
		patterns,
		cumulative: Mutex::new(String::new()),
		open_streams: AtomicUsize::new(streams.len()),
	});

	for stream in streams {
		tokio::spawn(Arc::clone(&watcher).drain(stream));
	}
}

struct OutputWatcher {
	state: Arc<ReadinessState>,
	patterns: Option<(Regex, Regex)>,
	cumulative: Mutex<String>,
	open_streams: AtomicUsize,
}

/// Log level for a line of dev server output.
fn output_level(line: &str) -> Level {
	if line.contains("ERROR") {
		Level::ERROR
	} else if line.contains("WARNING") {
		Level::WARN
	} else {
		Level::INFO
	}
}

impl OutputWatcher {
	async fn drain(self: Arc<Self>, stream: OutputStream) {
		let mut lines = BufReader::new(stream).lines();
		loop {
			match lines.next_line().await {
				Ok(Some(line)) => self.on_line(&line),
				Ok(None) => break,
				Err(e) => {
					debug!(target = "flowdev.devserver", error = %e, "dev server output stream failed");
					break;
				}
			}
		}

		if self.open_streams.fetch_sub(1, Ordering::AcqRel) == 1 {
			info!(target = "flowdev.devserver", "dev server output closed");
			self.state.set(Readiness::Exited);
		}
	}

	fn on_line(&self, raw: &str) {
		let line = ANSI_COLOR.replace_all(raw, "");
		let line = line.trim_end();

		let level = output_level(line);
		if level == Level::ERROR {
			error!(target = "flowdev.devserver.output", "{}", line);
		} else if level == Level::WARN {
			warn!(target = "flowdev.devserver.output", "{}", line);
		} else {
			info!(target = "flowdev.devserver.output", "{}", line);
		}

		let Some((success, failure)) = &self.patterns else {
			return;
		};

		let mut cumulative = self.cumulative.lock();
		cumulative.push_str(line);
		cumulative.push('\n');

		if success.is_match(line) {
			cumulative.clear();
			drop(cumulative);
			info!(target = "flowdev.devserver", "dev server compiled");
			self.state.compiled();
		} else if failure.is_match(line) {
			let output = std::mem::take(&mut *cumulative);
			drop(cumulative);
			warn!(target = "flowdev.devserver", "dev server failed to compile");
			self.state.compile_failed(output);
		}
	}
}

async fn poll_until_answering(state: Arc<ReadinessState>, port: u16, interval: Duration) {
	let client = match proxy::client(interval.max(Duration::from_millis(500))) {
		Ok(client) => client,
		Err(e) => {
			warn!(target = "flowdev.devserver", error = %e, "cannot build probe client");
			return;
		}
	};

	while state.current() == Readiness::Pending {
		if proxy::probe(&client, port).await {
			debug!(target = "flowdev.devserver", port, "dev server answered probe");
			state.compiled();
			return;
		}
		tokio::time::sleep(interval).await;
	}
}
