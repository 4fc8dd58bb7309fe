//! In-memory storage backend.
//!
//! Useful for tests and single-process development. Nothing survives a restart.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry, Versioned};
use async_trait::async_trait;
use pizzaiolo_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage implementation.
///
/// Entries live in an ordered map so `list_keys` can range-scan a prefix.
pub struct MemoryStorage {
	store: Arc<RwLock<BTreeMap<String, Versioned<Vec<u8>>>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(BTreeMap::new())),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Versioned<Vec<u8>>, StorageError> {
		let store = self.store.read().await;
		store.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn compare_and_set(
		&self,
		key: &str,
		value: Vec<u8>,
		expected: Option<u64>,
	) -> Result<u64, StorageError> {
		let mut store = self.store.write().await;
		let actual = store.get(key).map(|entry| entry.version);
		if actual != expected {
			return Err(StorageError::Conflict {
				key: key.to_string(),
				expected,
				actual,
			});
		}

		let version = actual.unwrap_or(0) + 1;
		store.insert(key.to_string(), Versioned::new(value, version));
		Ok(version)
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let store = self.store.read().await;
		Ok(store
			.range(prefix.to_string()..)
			.take_while(|(key, _)| key.starts_with(prefix))
			.map(|(key, _)| key.clone())
			.collect())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// Configuration schema for MemoryStorage. Accepts an empty table only.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_basic_operations() {
		let storage = MemoryStorage::new();

		let key = "orders:ord_1";
		let version = storage
			.compare_and_set(key, b"margherita".to_vec(), None)
			.await
			.unwrap();
		assert_eq!(version, 1);

		let retrieved = storage.get_bytes(key).await.unwrap();
		assert_eq!(retrieved.value, b"margherita".to_vec());
		assert_eq!(retrieved.version, 1);

		assert!(matches!(
			storage.get_bytes("orders:ord_2").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_compare_and_set_rejects_stale_version() {
		let storage = MemoryStorage::new();
		let key = "orders:ord_1";

		storage.compare_and_set(key, b"v1".to_vec(), None).await.unwrap();
		storage
			.compare_and_set(key, b"v2".to_vec(), Some(1))
			.await
			.unwrap();

		let stale = storage.compare_and_set(key, b"v2b".to_vec(), Some(1)).await;
		assert!(matches!(
			stale,
			Err(StorageError::Conflict {
				expected: Some(1),
				actual: Some(2),
				..
			})
		));
		assert_eq!(storage.get_bytes(key).await.unwrap().value, b"v2".to_vec());
	}

	#[tokio::test]
	async fn test_concurrent_writers_one_wins() {
		let storage = Arc::new(MemoryStorage::new());
		storage
			.compare_and_set("orders:race", b"v1".to_vec(), None)
			.await
			.unwrap();

		let handles: Vec<_> = (0..8)
			.map(|i| {
				let storage = Arc::clone(&storage);
				tokio::spawn(async move {
					storage
						.compare_and_set("orders:race", vec![i], Some(1))
						.await
				})
			})
			.collect();

		let mut wins = 0;
		for handle in handles {
			if handle.await.unwrap().is_ok() {
				wins += 1;
			}
		}
		assert_eq!(wins, 1);
		assert_eq!(storage.get_bytes("orders:race").await.unwrap().version, 2);
	}

	#[tokio::test]
	async fn test_list_keys_prefix() {
		let storage = MemoryStorage::new();
		for key in ["orders:b", "orders:a", "ordersx:c", "menu:d"] {
			storage.compare_and_set(key, vec![], None).await.unwrap();
		}

		assert_eq!(
			storage.list_keys("orders:").await.unwrap(),
			vec!["orders:a", "orders:b"]
		);
	}

	#[test]
	fn test_factory_rejects_options() {
		let config: toml::Value = toml::from_str("storage_path = \"/tmp\"").unwrap();
		assert!(matches!(
			create_storage(&config),
			Err(StorageError::Configuration(_))
		));
		assert!(create_storage(&toml::Value::Table(toml::map::Map::new())).is_ok());
	}
}
