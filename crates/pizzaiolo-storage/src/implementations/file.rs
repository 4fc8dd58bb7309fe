//! File-based storage backend.
//!
//! Each key is one file under the base directory. File names are the
//! hex-encoded key, so arbitrary order ids map to safe names and keys can be
//! recovered from a directory listing. Every file starts with a fixed header
//! carrying the record version used for compare-and-set.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry, Versioned};
use async_trait::async_trait;
use pizzaiolo_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;

#[allow(clippy::doc_nested_refdefs)]
/// Fixed-size file header.
///
/// Binary layout (32 bytes total):
/// - [0-3]: Magic bytes "PZIO"
/// - [4-5]: Format version (u16, little-endian)
/// - [6-13]: Record version (u64, little-endian)
/// - [14-31]: Reserved
#[derive(Debug, Clone, Copy, PartialEq)]
struct FileHeader {
	format: u16,
	record_version: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"PZIO";
	const FORMAT: u16 = 1;
	const SIZE: usize = 32;

	fn new(record_version: u64) -> Self {
		Self {
			format: Self::FORMAT,
			record_version,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.format.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.record_version.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Corrupt("File too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Corrupt("Bad magic bytes".into()));
		}

		let format = u16::from_le_bytes([bytes[4], bytes[5]]);
		if format > Self::FORMAT {
			return Err(StorageError::Corrupt(format!(
				"Unsupported file format: {}",
				format
			)));
		}

		let mut version_bytes = [0u8; 8];
		version_bytes.copy_from_slice(&bytes[6..14]);

		Ok(Self {
			format,
			record_version: u64::from_le_bytes(version_bytes),
		})
	}
}

/// File-based storage implementation.
pub struct FileStorage {
	base_path: PathBuf,
	/// Serializes compare-and-set within this process.
	write_lock: Mutex<()>,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self {
			base_path,
			write_lock: Mutex::new(()),
		}
	}

	fn get_file_path(&self, key: &str) -> PathBuf {
		self.base_path.join(format!("{}.bin", hex::encode(key)))
	}

	fn key_from_file_name(name: &str) -> Option<String> {
		let encoded = name.strip_suffix(".bin")?;
		let bytes = hex::decode(encoded).ok()?;
		String::from_utf8(bytes).ok()
	}

	async fn read_file(&self, key: &str) -> Result<Option<Versioned<Vec<u8>>>, StorageError> {
		let data = match fs::read(self.get_file_path(key)).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let header = FileHeader::deserialize(&data)?;
		Ok(Some(Versioned::new(
			data[FileHeader::SIZE..].to_vec(),
			header.record_version,
		)))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Versioned<Vec<u8>>, StorageError> {
		self.read_file(key).await?.ok_or(StorageError::NotFound)
	}

	async fn compare_and_set(
		&self,
		key: &str,
		value: Vec<u8>,
		expected: Option<u64>,
	) -> Result<u64, StorageError> {
		let _guard = self.write_lock.lock().await;

		let actual = self.read_file(key).await?.map(|stored| stored.version);
		if actual != expected {
			return Err(StorageError::Conflict {
				key: key.to_string(),
				expected,
				actual,
			});
		}

		fs::create_dir_all(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		let version = actual.unwrap_or(0) + 1;
		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&FileHeader::new(version).serialize());
		file_data.extend_from_slice(&value);

		// Write to a temp file then rename so readers never see a torn record
		let path = self.get_file_path(key);
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(version)
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let file_name = entry.file_name();
			let Some(name) = file_name.to_str() else {
				continue;
			};
			match Self::key_from_file_name(name) {
				Some(key) if key.starts_with(prefix) => keys.push(key),
				Some(_) => {},
				None => tracing::debug!("Skipping unrecognized file {:?}", entry.path()),
			}
		}

		keys.sort();
		Ok(keys)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(path) if path.trim().is_empty() => {
							Err("storage_path cannot be empty".to_string())
						},
						_ => Ok(()),
					}
				}),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for order files (default: "./data/orders")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/orders");

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn test_header_round_trip() {
		let header = FileHeader::new(42);
		let parsed = FileHeader::deserialize(&header.serialize()).unwrap();
		assert_eq!(parsed, header);

		assert!(FileHeader::deserialize(b"PZIO").is_err());
		assert!(FileHeader::deserialize(&[0u8; FileHeader::SIZE]).is_err());
	}

	#[tokio::test]
	async fn test_versions_survive_reopen() {
		let dir = TempDir::new().unwrap();
		let key = "orders:ord/with:odd chars";

		{
			let storage = FileStorage::new(dir.path().to_path_buf());
			storage.compare_and_set(key, b"v1".to_vec(), None).await.unwrap();
			storage
				.compare_and_set(key, b"v2".to_vec(), Some(1))
				.await
				.unwrap();
		}

		let reopened = FileStorage::new(dir.path().to_path_buf());
		let stored = reopened.get_bytes(key).await.unwrap();
		assert_eq!(stored, Versioned::new(b"v2".to_vec(), 2));
		assert_eq!(reopened.list_keys("orders:").await.unwrap(), vec![key]);
	}

	#[tokio::test]
	async fn test_conflict_on_stale_version() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());
		let key = "orders:ord_1";

		storage.compare_and_set(key, b"v1".to_vec(), None).await.unwrap();
		assert!(matches!(
			storage.compare_and_set(key, b"again".to_vec(), None).await,
			Err(StorageError::Conflict {
				expected: None,
				actual: Some(1),
				..
			})
		));
		assert!(matches!(
			storage.get_bytes("orders:ord_2").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_damaged_header_is_corrupt() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());

		std::fs::write(storage.get_file_path("orders:short"), b"PZ").unwrap();
		let mut wrong_magic = FileHeader::new(1).serialize().to_vec();
		wrong_magic[0..4].copy_from_slice(b"JUNK");
		std::fs::write(storage.get_file_path("orders:magic"), wrong_magic).unwrap();

		assert!(matches!(
			storage.get_bytes("orders:short").await,
			Err(StorageError::Corrupt(_))
		));
		assert!(matches!(
			storage.get_bytes("orders:magic").await,
			Err(StorageError::Corrupt(_))
		));
		assert_eq!(
			storage.list_keys("orders:").await.unwrap(),
			vec!["orders:magic", "orders:short"]
		);
	}

	#[tokio::test]
	async fn test_list_keys_missing_dir_is_empty() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().join("not-yet"));
		assert!(storage.list_keys("orders:").await.unwrap().is_empty());
	}

	#[test]
	fn test_schema() {
		let ok: toml::Value = toml::from_str("storage_path = \"./data\"").unwrap();
		assert!(FileStorageSchema.validate(&ok).is_ok());

		let empty: toml::Value = toml::from_str("storage_path = \" \"").unwrap();
		assert!(FileStorageSchema.validate(&empty).is_err());

		let wrong: toml::Value = toml::from_str("storage_path = 7").unwrap();
		assert!(create_storage(&wrong).is_err());
	}
}
