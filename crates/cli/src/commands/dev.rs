use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use flowdev::{DeploymentConfig, ServiceContext, SessionStore, context::properties};
use flowdev_runtime::{
	CommandLauncher, DevServerConfig, DevServerHandle, DevServerLauncher, DevServerRegistry, NodeLauncher, Readiness, ReadySignal,
};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::DevArgs;
use crate::frontend::{self, AppState};
use crate::output::{OutputFormat, ResultBuilder, print_result};

pub async fn execute(args: DevArgs, format: OutputFormat) -> Result<()> {
	let started = Instant::now();
	let project_dir = args
		.project
		.canonicalize()
		.with_context(|| format!("project directory {} not found", args.project.display()))?;

	let mut config = DevServerConfig::load_from_project(&project_dir)?;
	if let Some(port) = args.port {
		config.running_port = Some(port);
	}

	let context = Arc::new(ServiceContext::new("flowdev"));
	let deployment = DeploymentConfig::with_properties(
		context.clone(),
		[
			(properties::PRODUCTION_MODE, config.production_mode.to_string()),
			(properties::ENABLE_DEV_SERVER, config.enable_dev_server.to_string()),
			(properties::REUSE_DEV_SERVER, config.reuse_dev_server.to_string()),
		],
	);
	info!(
		target = "flowdev.cli",
		production = deployment.is_production_mode()?,
		usage_statistics = deployment.usage_statistics_enabled()?,
		"deployment configured"
	);

	let launcher: Arc<dyn DevServerLauncher> = match &args.command {
		Some(command) => Arc::new(CommandLauncher::parse(command)?),
		None => Arc::new(NodeLauncher),
	};
	let signal = if args.probe_ready {
		ReadySignal::probe()
	} else {
		ReadySignal::from_config(&config)?
	};

	let registry = deployment
		.attributes()
		.get_or_insert_with(|| DevServerRegistry::new(launcher));

	let handle = registry.start(&config, &project_dir, signal).await?;
	if let Some(handle) = &handle {
		match handle.wait_ready(config.ready_timeout()).await {
			Ok(Readiness::CompileFailed) => {
				let output = handle.failed_output().unwrap_or_default();
				warn!(target = "flowdev.cli", output = %output, "dev server failed to compile");
			}
			Ok(_) => {}
			Err(e) if e.is_timeout() => {
				warn!(target = "flowdev.cli", port = handle.port(), "dev server not ready yet, serving anyway");
			}
			Err(e) => {
				if let Err(stop_err) = registry.stop().await {
					warn!(target = "flowdev.cli", error = %stop_err, "failed to stop dev server");
				}
				return Err(e.into());
			}
		}
	}

	// A server launched here belongs to this process and goes down with it.
	let served = serve(&args, format, started, handle.as_deref(), &registry, context, &config).await;

	if let Err(e) = registry.release().await {
		warn!(target = "flowdev.cli", error = %e, "failed to stop dev server");
	}
	served
}

async fn serve(
	args: &DevArgs,
	format: OutputFormat,
	started: Instant,
	handle: Option<&DevServerHandle>,
	registry: &Arc<DevServerRegistry>,
	context: Arc<ServiceContext>,
	config: &DevServerConfig,
) -> Result<()> {
	let listener = TcpListener::bind(args.listen)
		.await
		.with_context(|| format!("cannot listen on {}", args.listen))?;
	let local = listener.local_addr()?;

	let result = ResultBuilder::new("dev")
		.data(json!({
			"listen": format!("http://{local}"),
			"devServerPort": handle.map(|h| h.port()),
			"reused": handle.is_some_and(|h| h.is_reused()),
		}))
		.duration(started.elapsed())
		.build();
	print_result(&result, format);

	let state = AppState {
		sessions: Arc::new(SessionStore::new(context)),
		registry: registry.clone(),
		config: Arc::new(config.clone()),
	};
	axum::serve(listener, frontend::router(state))
		.with_graceful_shutdown(async {
			let _ = tokio::signal::ctrl_c().await;
			info!(target = "flowdev.cli", "shutting down");
		})
		.await
		.context("front end failed")
}


