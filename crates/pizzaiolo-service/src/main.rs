//! Main entry point for the pizzaiolo order service.
//!
//! Loads the configuration, wires the configured storage backend into the
//! fulfillment engine, then runs the expiry sweep and the order board API
//! side by side until interrupted.

use clap::Parser;
use pizzaiolo_config::Config;
use pizzaiolo_core::{EngineBuilder, EngineFactories, FulfillmentEngine};
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

use pizzaiolo_storage::implementations::file::create_storage as create_file_storage;
use pizzaiolo_storage::implementations::memory::create_storage as create_memory_storage;

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

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(build_engine(config.clone())?);
	engine.initialize().await?;

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			let engine_task = engine.run();
			let api_task = server::start_server(api_config, Arc::clone(&engine));

			tokio::select! {
				result = engine_task => {
					tracing::info!("Engine finished");
					result?;
				}
				result = api_task => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("API disabled, running expiry sweep only");
			engine.run().await?;
		},
	}

	engine.shutdown().await?;
	tracing::info!("Stopped");
	Ok(())
}

/// Builds a factory HashMap, casting each factory to the interface's
/// function pointer type.
macro_rules! create_factory_map {
	($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
		let mut factories = std::collections::HashMap::new();
		$(
			factories.insert(
				$name.to_string(),
				$factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
			);
		)*
		factories
	}};
}

/// Builds the engine with every storage backend this binary ships.
fn build_engine(config: Config) -> Result<FulfillmentEngine, Box<dyn std::error::Error>> {
	let storage_factories = create_factory_map!(
		pizzaiolo_storage::StorageInterface,
		pizzaiolo_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	Ok(EngineBuilder::new(config).build(EngineFactories { storage_factories })?)
}
