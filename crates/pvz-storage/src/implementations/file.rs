//! File-based storage backend.
//!
//! Each key is one file: `namespace:id` maps to `<base>/<namespace>/<id>.bin`.
//! Writes go to a temporary file which is synced and then renamed over the
//! target, so a crash never leaves a half-written record behind. The base
//! directory is locked for the lifetime of the backend so that only one
//! process writes to it.

use crate::{split_key, StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use fs2::FileExt;
use pvz_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, StorageKey, ValidationError,
};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const LOCK_FILE: &str = ".lock";
const DATA_EXTENSION: &str = "bin";

fn unix_now() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or_default()
}

/// Fixed-size file header carrying the expiry time.
///
/// Binary layout (16 bytes):
/// - [0-3]: magic bytes "PVZS"
/// - [4-5]: version (u16, little-endian)
/// - [6-13]: expiry (u64, little-endian, Unix seconds, 0 = never)
/// - [14-15]: reserved
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileHeader {
	version: u16,
	expires_at: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"PVZS";
	const VERSION: u16 = 1;
	const SIZE: usize = 16;

	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0
		} else {
			unix_now().saturating_add(ttl.as_secs())
		};

		Self {
			version: Self::VERSION,
			expires_at,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	/// Parses the header, or `None` if the bytes do not start with one.
	fn deserialize(bytes: &[u8]) -> Result<Option<Self>, StorageError> {
		if bytes.len() < Self::SIZE || &bytes[0..4] != Self::MAGIC {
			return Ok(None);
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut expires = [0u8; 8];
		expires.copy_from_slice(&bytes[6..14]);

		Ok(Some(Self {
			version,
			expires_at: u64::from_le_bytes(expires),
		}))
	}

	fn is_expired(&self) -> bool {
		self.expires_at != 0 && unix_now() >= self.expires_at
	}
}

/// Default TTL per storage namespace, read from `ttl_<namespace>` keys.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
	ttls: HashMap<StorageKey, Duration>,
}

impl TtlConfig {
	fn from_config(config: &toml::Value) -> Self {
		let ttls = StorageKey::all()
			.filter_map(|key| {
				config
					.get(format!("ttl_{}", key.as_str()))
					.and_then(|v| v.as_integer())
					.map(|secs| (key, Duration::from_secs(secs.max(0) as u64)))
			})
			.collect();

		Self { ttls }
	}

	fn ttl_for(&self, key: &str) -> Duration {
		split_key(key)
			.and_then(|(namespace, _)| namespace.parse::<StorageKey>().ok())
			.and_then(|storage_key| self.ttls.get(&storage_key).copied())
			.unwrap_or(Duration::ZERO)
	}
}

/// File-based storage implementation.
pub struct FileStorage {
	base_path: PathBuf,
	ttl_config: TtlConfig,
	/// Held open for the advisory lock; released on drop.
	_lock: File,
}

impl FileStorage {
	/// Opens (creating if needed) a storage directory and locks it.
	///
	/// Fails if another live `FileStorage` already holds the directory.
	pub fn open(base_path: impl Into<PathBuf>, ttl_config: TtlConfig) -> Result<Self, StorageError> {
		let base_path = base_path.into();
		std::fs::create_dir_all(&base_path).map_err(|e| {
			StorageError::Backend(format!("Cannot create {}: {}", base_path.display(), e))
		})?;

		let lock = File::create(base_path.join(LOCK_FILE))
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		lock.try_lock_exclusive().map_err(|_| {
			StorageError::Backend(format!(
				"Storage directory {} is locked by another process",
				base_path.display()
			))
		})?;

		tracing::debug!(path = %base_path.display(), "Opened file storage");

		Ok(Self {
			base_path,
			ttl_config,
			_lock: lock,
		})
	}

	fn namespace_dir(&self, namespace: &str) -> PathBuf {
		self.base_path.join(sanitize(namespace))
	}

	/// Maps `namespace:id` to its file path.
	fn get_file_path(&self, key: &str) -> Result<PathBuf, StorageError> {
		let (namespace, id) = split_key(key)
			.ok_or_else(|| StorageError::Backend(format!("Key without namespace: {}", key)))?;
		Ok(self
			.namespace_dir(namespace)
			.join(format!("{}.{}", sanitize(id), DATA_EXTENSION)))
	}

	async fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
		let temp_path = path.with_extension("tmp");
		let mut file = fs::File::create(&temp_path).await?;
		file.write_all(data).await?;
		file.sync_all().await?;
		drop(file);
		fs::rename(&temp_path, path).await
	}

	async fn data_files(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
		let mut entries = match fs::read_dir(dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut files = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() == Some(std::ffi::OsStr::new(DATA_EXTENSION)) {
				files.push(path);
			}
		}
		Ok(files)
	}

	async fn cleanup_expired_files(&self) -> Result<usize, StorageError> {
		let mut removed = 0;
		let mut namespaces = fs::read_dir(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		while let Some(entry) = namespaces
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			if !entry.path().is_dir() {
				continue;
			}
			for path in Self::data_files(&entry.path()).await? {
				let data = match fs::read(&path).await {
					Ok(data) => data,
					Err(e) => {
						tracing::debug!("Skipping file {:?}: could not be read: {}", path, e);
						continue;
					},
				};
				let expired = matches!(FileHeader::deserialize(&data), Ok(Some(h)) if h.is_expired());
				if !expired {
					continue;
				}
				match fs::remove_file(&path).await {
					Ok(()) => removed += 1,
					Err(e) => tracing::warn!("Failed to remove expired file {:?}: {}", path, e),
				}
			}
		}

		Ok(removed)
	}
}

/// Replaces characters that would escape the namespace directory.
fn sanitize(segment: &str) -> String {
	segment.replace(['/', '\\', ':'], "_").replace("..", "_")
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key)?;

		let data = match fs::read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(StorageError::NotFound)
			},
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		match FileHeader::deserialize(&data)? {
			Some(header) if header.is_expired() => Err(StorageError::NotFound),
			Some(_) => Ok(data[FileHeader::SIZE..].to_vec()),
			// Files without a header are returned as-is.
			None => Ok(data),
		}
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.get_file_path(key)?;

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let ttl = ttl.unwrap_or_else(|| self.ttl_config.ttl_for(key));
		let header = FileHeader::new(ttl);

		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&header.serialize());
		file_data.extend_from_slice(&value);

		Self::write_atomically(&path, &file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.get_file_path(key)?;

		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		match self.get_bytes(key).await {
			Ok(_) => Ok(true),
			Err(StorageError::NotFound) => Ok(false),
			Err(e) => Err(e),
		}
	}

	async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		let files = Self::data_files(&self.namespace_dir(namespace)).await?;
		Ok(files
			.iter()
			.filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()))
			.map(|id| format!("{}:{}", namespace, id))
			.collect())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.cleanup_expired_files().await
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let mut optional_fields = vec![Field::new("storage_path", FieldType::String)
			.with_validator(|v| match v.as_str() {
				Some(path) if path.trim().is_empty() => Err("must not be empty".into()),
				_ => Ok(()),
			})];

		for storage_key in StorageKey::all() {
			optional_fields.push(Field::new(
				format!("ttl_{}", storage_key.as_str()),
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			));
		}

		Schema::new(vec![], optional_fields).validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: base directory (default: "./data/storage")
/// - `ttl_orders`, `ttl_meta`, `ttl_audit`: TTL in seconds per namespace
///   (default: 0, never expires)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage");

	Ok(Box::new(FileStorage::open(
		PathBuf::from(storage_path),
		TtlConfig::from_config(config),
	)?))
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

	fn open(dir: &TempDir) -> FileStorage {
		FileStorage::open(dir.path(), TtlConfig::default()).unwrap()
	}

	#[tokio::test]
	async fn test_roundtrip_and_layout() {
		let dir = TempDir::new().unwrap();
		let storage = open(&dir);

		storage.set_bytes("orders:7", b"{}".to_vec(), None).await.unwrap();

		assert!(dir.path().join("orders").join("7.bin").exists());
		assert!(!dir.path().join("orders").join("7.tmp").exists());
		assert_eq!(storage.get_bytes("orders:7").await.unwrap(), b"{}".to_vec());
	}

	#[tokio::test]
	async fn test_missing_and_deleted_keys() {
		let dir = TempDir::new().unwrap();
		let storage = open(&dir);

		assert!(matches!(
			storage.get_bytes("orders:1").await,
			Err(StorageError::NotFound)
		));

		storage.set_bytes("orders:1", vec![1], None).await.unwrap();
		assert!(storage.exists("orders:1").await.unwrap());

		storage.delete("orders:1").await.unwrap();
		assert!(!storage.exists("orders:1").await.unwrap());
		// deleting twice is fine
		storage.delete("orders:1").await.unwrap();
	}

	#[tokio::test]
	async fn test_list_keys_per_namespace() {
		let dir = TempDir::new().unwrap();
		let storage = open(&dir);

		storage.set_bytes("orders:1", vec![1], None).await.unwrap();
		storage.set_bytes("orders:2", vec![2], None).await.unwrap();
		storage.set_bytes("meta:sequence", vec![3], None).await.unwrap();

		let mut keys = storage.list_keys("orders").await.unwrap();
		keys.sort();
		assert_eq!(keys, vec!["orders:1", "orders:2"]);
		assert!(storage.list_keys("audit").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_data_survives_reopen() {
		let dir = TempDir::new().unwrap();
		{
			let storage = open(&dir);
			storage.set_bytes("orders:3", b"kept".to_vec(), None).await.unwrap();
		}

		let storage = open(&dir);
		assert_eq!(storage.get_bytes("orders:3").await.unwrap(), b"kept".to_vec());
	}

	#[test]
	fn test_directory_lock_is_exclusive() {
		let dir = TempDir::new().unwrap();
		let first = open(&dir);

		let second = FileStorage::open(dir.path(), TtlConfig::default());
		assert!(matches!(second, Err(StorageError::Backend(_))));

		drop(first);
		assert!(FileStorage::open(dir.path(), TtlConfig::default()).is_ok());
	}

	#[tokio::test]
	async fn test_expired_entries_are_hidden_and_cleaned() {
		let dir = TempDir::new().unwrap();
		let storage = open(&dir);

		let expired = FileHeader {
			version: FileHeader::VERSION,
			expires_at: 1,
		};
		let mut data = expired.serialize().to_vec();
		data.extend_from_slice(b"old");
		std::fs::create_dir_all(dir.path().join("audit")).unwrap();
		std::fs::write(dir.path().join("audit").join("1-a.bin"), data).unwrap();
		storage.set_bytes("audit:1-b", b"new".to_vec(), None).await.unwrap();

		assert!(matches!(
			storage.get_bytes("audit:1-a").await,
			Err(StorageError::NotFound)
		));
		assert_eq!(storage.cleanup_expired().await.unwrap(), 1);
		assert_eq!(storage.list_keys("audit").await.unwrap(), vec!["audit:1-b"]);
	}

	#[test]
	fn test_ttl_config_by_namespace() {
		let config: toml::Value = toml::from_str("ttl_audit = 60").unwrap();
		let ttl = TtlConfig::from_config(&config);

		assert_eq!(ttl.ttl_for("audit:1-x"), Duration::from_secs(60));
		assert_eq!(ttl.ttl_for("orders:1"), Duration::ZERO);
	}

	#[test]
	fn test_header_roundtrip() {
		let header = FileHeader::new(Duration::from_secs(3600));
		let parsed = FileHeader::deserialize(&header.serialize()).unwrap().unwrap();
		assert_eq!(parsed, header);
		assert!(!parsed.is_expired());
		assert!(FileHeader::deserialize(b"no header here").unwrap().is_none());
	}

	#[test]
	fn test_schema_rejects_negative_ttl() {
		let config: toml::Value = toml::from_str("ttl_audit = -5").unwrap();
		assert!(matches!(
			create_storage(&config),
			Err(StorageError::Configuration(_))
		));
	}
}
