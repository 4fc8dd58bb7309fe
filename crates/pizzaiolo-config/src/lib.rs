//! Configuration module for the pizzaiolo order service.
//!
//! Configuration is loaded from TOML. `${VAR}` and `${VAR:-default}` are
//! replaced from the environment before parsing, and a file may pull other
//! files in with `include = ["storage.toml"]` as long as every top-level
//! section is defined exactly once across all of them.

mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only, not the dump of the whole input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	/// Order storage backend.
	pub storage: StorageConfig,
	/// Expiry sweep settings.
	#[serde(default)]
	pub automation: AutomationConfig,
	/// HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Identity of this service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Name used in logs, e.g. the truck this instance serves.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Settings for the periodic sweep that expires stale unpaid pickup orders.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutomationConfig {
	#[serde(default = "default_automation_enabled")]
	pub enabled: bool,
	/// Seconds between sweeps.
	#[serde(default = "default_sweep_interval_seconds")]
	pub sweep_interval_seconds: u64,
	/// Minutes past `promisedAt` after which an unpaid pickup expires.
	#[serde(default = "default_expiry_grace_minutes")]
	pub expiry_grace_minutes: u64,
	/// How many times the sweep re-reads an order after losing a write race.
	#[serde(default = "default_max_conflict_retries")]
	pub max_conflict_retries: u32,
}

impl Default for AutomationConfig {
	fn default() -> Self {
		Self {
			enabled: default_automation_enabled(),
			sweep_interval_seconds: default_sweep_interval_seconds(),
			expiry_grace_minutes: default_expiry_grace_minutes(),
			max_conflict_retries: default_max_conflict_retries(),
		}
	}
}

fn default_automation_enabled() -> bool {
	true
}

fn default_sweep_interval_seconds() -> u64 {
	30
}

fn default_expiry_grace_minutes() -> u64 {
	60
}

fn default_max_conflict_retries() -> u32 {
	3
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// CORS configuration. Permissive when absent.
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins, e.g. the storefront and the staff board.
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	256 * 1024 // 256KB, orders are small
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to bound regex work.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Storage implementation config selected by `storage.primary`.
	pub fn primary_storage(&self) -> Option<(&str, &toml::Value)> {
		self.storage
			.implementations
			.get_key_value(&self.storage.primary)
			.map(|(name, value)| (name.as_str(), value))
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if self.primary_storage().is_none() {
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		let automation = &self.automation;
		if !(1..=3600).contains(&automation.sweep_interval_seconds) {
			return Err(ConfigError::Validation(
				"automation.sweep_interval_seconds must be between 1 and 3600".into(),
			));
		}
		if automation.expiry_grace_minutes == 0 {
			return Err(ConfigError::Validation(
				"automation.expiry_grace_minutes must be at least 1".into(),
			));
		}
		if automation.max_conflict_retries > 10 {
			return Err(ConfigError::Validation(
				"automation.max_conflict_retries cannot exceed 10".into(),
			));
		}

		if let Some(api) = self.api.as_ref().filter(|api| api.enabled) {
			if api.port == 0 {
				return Err(ConfigError::Validation("api.port cannot be 0".into()));
			}
			if api.timeout_seconds == 0 {
				return Err(ConfigError::Validation(
					"api.timeout_seconds must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses TOML, resolving environment variables and validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[service]
id = "truck-1"

[storage]
primary = "memory"
[storage.implementations.memory]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("PZ_TEST_HOST", "localhost");
		std::env::set_var("PZ_TEST_PORT", "5432");

		let input = "host = \"${PZ_TEST_HOST}:${PZ_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("PZ_TEST_HOST");
		std::env::remove_var("PZ_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${PZ_MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${PZ_MISSING_VAR}\"");
		assert!(result.unwrap_err().to_string().contains("PZ_MISSING_VAR"));
	}

	#[test]
	fn test_minimal_config_defaults() {
		let config: Config = MINIMAL.parse().unwrap();

		assert_eq!(config.service.id, "truck-1");
		assert_eq!(config.primary_storage().map(|(name, _)| name), Some("memory"));
		assert!(config.automation.enabled);
		assert_eq!(config.automation.sweep_interval_seconds, 30);
		assert_eq!(config.automation.expiry_grace_minutes, 60);
		assert_eq!(config.automation.max_conflict_retries, 3);
		assert!(config.api.is_none());
	}

	#[test]
	fn test_api_defaults() {
		let config: Config = format!("{}\n[api]\nenabled = true\n", MINIMAL)
			.parse()
			.unwrap();
		let api = config.api.unwrap();

		assert_eq!(api.host, "127.0.0.1");
		assert_eq!(api.port, 3000);
		assert!(api.cors.is_none());
	}

	#[test]
	fn test_config_with_env_vars() {
		std::env::set_var("PZ_TEST_SERVICE_ID", "truck-env");

		let config_str = r#"
[service]
id = "${PZ_TEST_SERVICE_ID}"

[storage]
primary = "file"
[storage.implementations.file]
storage_path = "${PZ_TEST_STORAGE_PATH:-./data/orders}"
"#;
		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.service.id, "truck-env");
		let (_, file) = config.primary_storage().unwrap();
		assert_eq!(
			file.get("storage_path").and_then(|v| v.as_str()),
			Some("./data/orders")
		);

		std::env::remove_var("PZ_TEST_SERVICE_ID");
	}

	#[test]
	fn test_primary_storage_must_exist() {
		let config_str = r#"
[service]
id = "truck-1"

[storage]
primary = "file"
[storage.implementations.memory]
"#;
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Primary storage 'file'"));
	}

	#[test]
	fn test_automation_bounds() {
		let zero_interval = format!("{}\n[automation]\nsweep_interval_seconds = 0\n", MINIMAL);
		assert!(zero_interval.parse::<Config>().is_err());

		let zero_grace = format!("{}\n[automation]\nexpiry_grace_minutes = 0\n", MINIMAL);
		assert!(zero_grace.parse::<Config>().is_err());

		let custom = format!(
			"{}\n[automation]\nenabled = false\nexpiry_grace_minutes = 45\n",
			MINIMAL
		);
		let config: Config = custom.parse().unwrap();
		assert!(!config.automation.enabled);
		assert_eq!(config.automation.expiry_grace_minutes, 45);
		assert_eq!(config.automation.sweep_interval_seconds, 30);
	}

	#[test]
	fn test_empty_service_id_rejected() {
		let config_str = MINIMAL.replace("truck-1", " ");
		assert!(config_str.parse::<Config>().is_err());
	}
}
