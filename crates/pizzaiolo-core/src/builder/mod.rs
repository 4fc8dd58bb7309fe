//! Builder for constructing fulfillment engines.
//!
//! Storage backends register factories by name; the builder picks the one
//! named by `storage.primary` and hands it the matching configuration table.

use crate::clock::{Clock, SystemClock};
use crate::engine::FulfillmentEngine;
use pizzaiolo_config::Config;
use pizzaiolo_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions available to the builder, keyed by implementation name.
pub struct EngineFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

/// Builder for constructing a [`FulfillmentEngine`].
pub struct EngineBuilder {
	config: Config,
	clock: Arc<dyn Clock>,
}

impl EngineBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			clock: Arc::new(SystemClock),
		}
	}

	/// Replaces the wall clock, e.g. with a fixed clock in tests.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	pub fn build<SF>(self, factories: EngineFactories<SF>) -> Result<FulfillmentEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let primary = &self.config.storage.primary;
		let storage_config = self
			.config
			.storage
			.implementations
			.get(primary)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Primary storage '{}' has no configuration",
					primary
				))
			})?;
		let factory = factories.storage_factories.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("storage implementation '{}'", primary))
		})?;

		let backend = match factory(storage_config) {
			Ok(backend) => {
				tracing::info!(component = "storage", implementation = %primary, "Loaded");
				backend
			},
			Err(e) => {
				tracing::error!(
					component = "storage",
					implementation = %primary,
					error = %e,
					"Failed to create storage implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create storage implementation '{}': {}",
					primary, e
				)));
			},
		};

		for name in self.config.storage.implementations.keys() {
			if name != primary {
				tracing::debug!(component = "storage", implementation = %name, "Configured but not primary, skipping");
			}
		}

		let storage = Arc::new(StorageService::new(backend));
		Ok(FulfillmentEngine::new(self.config, storage, self.clock))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pizzaiolo_storage::implementations::memory;
	use pizzaiolo_types::ImplementationRegistry;

	fn config(primary: &str) -> Config {
		format!(
			r#"
[service]
id = "truck-1"

[storage]
primary = "{}"
[storage.implementations.{}]
"#,
			primary, primary
		)
		.parse()
		.unwrap()
	}

	fn factories() -> EngineFactories<pizzaiolo_storage::StorageFactory> {
		EngineFactories {
			storage_factories: HashMap::from([(
				memory::Registry::NAME.to_string(),
				memory::Registry::factory(),
			)]),
		}
	}

	#[test]
	fn test_build_with_registered_storage() {
		let engine = EngineBuilder::new(config("memory")).build(factories());
		assert!(engine.is_ok());
	}

	#[test]
	fn test_unregistered_primary_is_missing_component() {
		let result = EngineBuilder::new(config("redis")).build(factories());
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}

	#[test]
	fn test_factory_failure_is_config_error() {
		let config: Config = r#"
[service]
id = "truck-1"

[storage]
primary = "memory"
[storage.implementations.memory]
unexpected = true
"#
		.parse()
		.unwrap();

		let result = EngineBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::Config(_))));
	}
}
