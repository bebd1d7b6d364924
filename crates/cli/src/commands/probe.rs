use std::time::{Duration, Instant};

use anyhow::Result;
use flowdev_runtime::proxy;
use serde_json::json;
use tracing::info;

use crate::output::{OutputFormat, ResultBuilder, print_result};

pub async fn probe(port: u16, timeout_ms: u64, format: OutputFormat) -> Result<()> {
	let started = Instant::now();
	let client = proxy::client(Duration::from_millis(timeout_ms))?;
	let alive = proxy::probe(&client, port).await;

	if !alive {
		return Err(flowdev_runtime::Error::PortNotResponding(port).into());
	}

	let result = ResultBuilder::new("probe")
		.data(json!({ "port": port, "alive": alive }))
		.duration(started.elapsed())
		.build();
	print_result(&result, format);
	Ok(())
}

pub async fn stop(port: u16, timeout_ms: u64, format: OutputFormat) -> Result<()> {
	let timeout = Duration::from_millis(timeout_ms);
	let client = proxy::client(timeout)?;

	if !proxy::probe(&client, port).await {
		return Err(flowdev_runtime::Error::PortNotResponding(port).into());
	}

	info!(target = "flowdev.cli", port, "requesting dev server shutdown");
	proxy::send_stop(&client, port, timeout).await;

	let result = ResultBuilder::new("stop")
		.data(json!({ "port": port, "stopRequested": true }))
		.build();
	print_result(&result, format);
	Ok(())
}
