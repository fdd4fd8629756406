//! Main entry point for the pickup-point order service.
//!
//! Loads the configuration, opens the order store on the configured storage
//! backend and serves the order API until interrupted.

use clap::Parser;
use pvz_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the order service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the order service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the engine and seeds sample data when configured
/// 5. Serves the API until Ctrl+C, then shuts down gracefully
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started PVZ order service");

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(factory_registry::build_engine_from_config(config.clone()).await?);
	engine.initialize().await?;

	let cleanup_handle = engine.spawn_storage_cleanup();

	if let Some(api_config) = config.enabled_api().cloned() {
		server::start_server(api_config, Arc::clone(&engine), shutdown_signal()).await?;
		tracing::info!("API server finished");
	} else {
		tracing::info!("API server disabled, waiting for shutdown signal");
		shutdown_signal().await;
	}

	cleanup_handle.abort();
	engine.shutdown().await?;

	tracing::info!("Stopped PVZ order service");
	Ok(())
}

/// Resolves on Ctrl+C.
async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!("Failed to listen for shutdown signal: {}", e);
		return;
	}
	tracing::info!("Shutdown signal received");
}
