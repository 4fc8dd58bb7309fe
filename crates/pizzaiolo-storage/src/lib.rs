//! Storage module for the pizzaiolo order system.
//!
//! Provides a versioned key-value abstraction with optimistic concurrency:
//! every stored value carries a version counter, and writes name the version
//! they expect to replace. Two actors racing on the same key (a staff tap and
//! an expiry sweep, or two staff devices) cannot silently overwrite each other;
//! the loser gets [`StorageError::Conflict`] and must re-read.

use async_trait::async_trait;
use pizzaiolo_types::{ConfigSchema, ImplementationRegistry};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// The requested key does not exist.
	#[error("Not found")]
	NotFound,
	/// The stored version differs from the one the writer expected.
	///
	/// `expected: None` means the writer expected the key to be absent.
	#[error("Version conflict on '{key}': expected {expected:?}, found {actual:?}")]
	Conflict {
		key: String,
		expected: Option<u64>,
		actual: Option<u64>,
	},
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// A stored record exists but its framing is unreadable.
	#[error("Corrupt record: {0}")]
	Corrupt(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A value read from storage together with its version.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
	pub value: T,
	/// Starts at 1 on creation and increases by one on every write.
	pub version: u64,
}

impl<T> Versioned<T> {
	pub fn new(value: T, version: u64) -> Self {
		Self { value, version }
	}
}

/// Low-level interface for storage backends.
///
/// Backends store raw bytes and must make [`compare_and_set`] atomic with
/// respect to other writers of the same key.
///
/// [`compare_and_set`]: StorageInterface::compare_and_set
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes and the current version for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Versioned<Vec<u8>>, StorageError>;

	/// Writes `value` if the key's current version equals `expected`.
	///
	/// `None` means the key must not exist yet. Returns the new version.
	async fn compare_and_set(
		&self,
		key: &str,
		value: Vec<u8>,
		expected: Option<u64>,
	) -> Result<u64, StorageError>;

	/// Lists every key starting with `prefix`, in ascending order.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Signature every storage backend factory has.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations as (name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// High-level storage service that provides typed, versioned operations.
///
/// Values are serialized to JSON and stored under `"{namespace}:{id}"`.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Stores a new value. Fails with `Conflict` if the id is taken.
	pub async fn create<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<u64, StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.compare_and_set(&Self::key(namespace, id), bytes, None)
			.await
	}

	/// Retrieves and deserializes a value with its version.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Versioned<T>, StorageError> {
		let stored = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		let value = serde_json::from_slice(&stored.value)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;
		Ok(Versioned::new(value, stored.version))
	}

	/// Replaces a value, conditioned on it still being at `expected_version`.
	///
	/// Returns the new version. A missing key is reported as `NotFound`, a
	/// version mismatch as `Conflict`.
	pub async fn update<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
		expected_version: u64,
	) -> Result<u64, StorageError> {
		let key = Self::key(namespace, id);
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;

		match self
			.backend
			.compare_and_set(&key, bytes, Some(expected_version))
			.await
		{
			Err(StorageError::Conflict { actual: None, .. }) => Err(StorageError::NotFound),
			other => other,
		}
	}

	/// Lists the ids stored in a namespace.
	pub async fn list_ids(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		let prefix = format!("{}:", namespace);
		let keys = self.backend.list_keys(&prefix).await?;
		Ok(keys
			.into_iter()
			.filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
			.collect())
	}
}
