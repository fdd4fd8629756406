//! Configuration builder for creating test and development configurations.
//!
//! Produces a `Config` backed by in-memory storage unless told otherwise.

use crate::{ApiConfig, Config, ServiceConfig, StorageConfig};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	seed_sample_data: bool,
	storage_primary: String,
	storage_implementations: HashMap<String, toml::Value>,
	storage_cleanup_interval_seconds: u64,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		let mut storage_implementations = HashMap::new();
		storage_implementations.insert(
			"memory".to_string(),
			toml::Value::Table(toml::map::Map::new()),
		);

		Self {
			service_id: "test-pvz".to_string(),
			seed_sample_data: false,
			storage_primary: "memory".to_string(),
			storage_implementations,
			storage_cleanup_interval_seconds: 60,
			api: None,
		}
	}

	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	/// Seeds demonstration orders into an empty store on startup.
	pub fn seed_sample_data(mut self, seed: bool) -> Self {
		self.seed_sample_data = seed;
		self
	}

	/// Sets the primary storage implementation and its configuration.
	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		let primary = primary.into();
		self.storage_implementations.insert(primary.clone(), config);
		self.storage_primary = primary;
		self
	}

	/// Uses file storage rooted at `path`.
	pub fn file_storage(self, path: impl Into<String>) -> Self {
		let mut table = toml::map::Map::new();
		table.insert("storage_path".to_string(), toml::Value::String(path.into()));
		self.storage("file", toml::Value::Table(table))
	}

	pub fn storage_cleanup_interval_seconds(mut self, interval: u64) -> Self {
		self.storage_cleanup_interval_seconds = interval;
		self
	}

	/// Sets the API configuration.
	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		Config {
			service: ServiceConfig {
				id: self.service_id,
				seed_sample_data: self.seed_sample_data,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: self.storage_implementations,
				cleanup_interval_seconds: self.storage_cleanup_interval_seconds,
			},
			api: self.api,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_to_memory_storage() {
		let config = ConfigBuilder::new().build();

		assert_eq!(config.service.id, "test-pvz");
		assert_eq!(config.storage.primary, "memory");
		assert!(config.storage.implementations.contains_key("memory"));
		assert!(config.api.is_none());
	}

	#[test]
	fn test_file_storage_sets_primary() {
		let config = ConfigBuilder::new()
			.file_storage("/tmp/pvz-data")
			.seed_sample_data(true)
			.build();

		assert_eq!(config.storage.primary, "file");
		let file = &config.storage.implementations["file"];
		assert_eq!(
			file.get("storage_path").and_then(|v| v.as_str()),
			Some("/tmp/pvz-data")
		);
		assert!(config.service.seed_sample_data);
	}
}
