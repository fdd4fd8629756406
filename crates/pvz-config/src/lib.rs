//! Configuration module for the pickup-point order service.
//!
//! Configuration is loaded from TOML files and validated before use.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)
//!
//! String values may reference environment variables as `${NAME}` or
//! `${NAME:-default}`.

/// Fluent builders for test and development configurations.
pub mod builders {
	pub mod config;
}
mod loader;

pub use builders::config::ConfigBuilder;

use once_cell::sync::Lazy;
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
		// Keep the message, drop the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity and behaviour of this service instance.
	pub service: ServiceConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Identifier of this pickup point deployment, used in logs.
	pub id: String,
	/// Insert demonstration orders when the store starts empty.
	#[serde(default)]
	pub seed_sample_data: bool,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	#[serde(default = "default_cleanup_interval")]
	pub cleanup_interval_seconds: u64,
}

fn default_cleanup_interval() -> u64 {
	3600
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
	/// How many following ports to try when `port` is taken.
	#[serde(default = "default_port_fallback_attempts")]
	pub port_fallback_attempts: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// CORS configuration; permissive when absent.
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins; `"*"` allows any.
	#[serde(default)]
	pub allowed_origins: Vec<String>,
	#[serde(default)]
	pub allowed_headers: Vec<String>,
	#[serde(default)]
	pub allowed_methods: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	8000
}

fn default_port_fallback_attempts() -> u16 {
	2
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024 // 1MB
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			host: default_api_host(),
			port: default_api_port(),
			port_fallback_attempts: default_port_fallback_attempts(),
			timeout_seconds: default_api_timeout(),
			max_request_size: default_max_request_size(),
			cors: None,
		}
	}
}

static ENV_VAR_PATTERN: Lazy<Result<Regex, regex::Error>> =
	Lazy::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}"));

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of VAR_NAME, or with the default
/// from `${VAR_NAME:-default}` when the variable is unset. Input is limited
/// to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = ENV_VAR_PATTERN
		.as_ref()
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full), Some(name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};

		let value = match std::env::var(name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..full.start()]);
		result.push_str(&value);
		last = full.end();
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

	/// Returns the API config when the server is enabled.
	pub fn enabled_api(&self) -> Option<&ApiConfig> {
		self.api.as_ref().filter(|api| api.enabled)
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
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.storage.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		if let Some(api) = self.enabled_api() {
			if api.host.trim().is_empty() {
				return Err(ConfigError::Validation("API host cannot be empty".into()));
			}
			if api.timeout_seconds == 0 {
				return Err(ConfigError::Validation(
					"API timeout_seconds must be greater than 0".into(),
				));
			}
			if api.max_request_size == 0 {
				return Err(ConfigError::Validation(
					"API max_request_size must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses a TOML string: resolves environment variables, deserializes
/// and validates.
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
id = "pvz-001"

[storage]
primary = "memory"
[storage.implementations.memory]
"#;

	#[test]
	fn test_minimal_config_uses_defaults() {
		let config = Config::from_str(MINIMAL).unwrap();

		assert_eq!(config.service.id, "pvz-001");
		assert!(!config.service.seed_sample_data);
		assert_eq!(config.storage.cleanup_interval_seconds, 3600);
		assert!(config.api.is_none());
		assert!(config.enabled_api().is_none());
	}

	#[test]
	fn test_api_defaults() {
		let config = Config::from_str(&format!("{}\n[api]\nenabled = true\n", MINIMAL)).unwrap();
		let api = config.enabled_api().unwrap();

		assert_eq!(api.host, "127.0.0.1");
		assert_eq!(api.port, 8000);
		assert_eq!(api.port_fallback_attempts, 2);
		assert_eq!(api.max_request_size, 1024 * 1024);
	}

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("PVZ_TEST_STORAGE_PATH", "/tmp/pvz");

		let resolved =
			resolve_env_vars("path = \"${PVZ_TEST_STORAGE_PATH}\"\nport = ${PVZ_TEST_UNSET_PORT:-9000}")
				.unwrap();
		assert_eq!(resolved, "path = \"/tmp/pvz\"\nport = 9000");
	}

	#[test]
	fn test_missing_env_var_error() {
		let err = resolve_env_vars("id = \"${PVZ_TEST_DEFINITELY_UNSET}\"").unwrap_err();
		assert!(err.to_string().contains("PVZ_TEST_DEFINITELY_UNSET"));
	}

	#[test]
	fn test_config_with_env_vars() {
		std::env::set_var("PVZ_TEST_SERVICE_ID", "pvz-env");
		let config_str = MINIMAL.replace("pvz-001", "${PVZ_TEST_SERVICE_ID}");

		let config = Config::from_str(&config_str).unwrap();
		assert_eq!(config.service.id, "pvz-env");
	}

	#[test]
	fn test_primary_storage_must_be_configured() {
		let config_str = MINIMAL.replace("primary = \"memory\"", "primary = \"file\"");
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("Primary storage 'file'"));
	}

	#[test]
	fn test_cleanup_interval_bounds() {
		let zero = MINIMAL.replace(
			"primary = \"memory\"",
			"primary = \"memory\"\ncleanup_interval_seconds = 0",
		);
		assert!(matches!(
			Config::from_str(&zero),
			Err(ConfigError::Validation(_))
		));

		let too_long = MINIMAL.replace(
			"primary = \"memory\"",
			"primary = \"memory\"\ncleanup_interval_seconds = 90000",
		);
		assert!(Config::from_str(&too_long).is_err());
	}

	#[test]
	fn test_empty_service_id_rejected() {
		let config_str = MINIMAL.replace("pvz-001", " ");
		assert!(Config::from_str(&config_str).is_err());
	}

	#[test]
	fn test_disabled_api_is_not_validated() {
		let config_str = format!("{}\n[api]\nenabled = false\ntimeout_seconds = 0\n", MINIMAL);
		let config = Config::from_str(&config_str).unwrap();
		assert!(config.enabled_api().is_none());
	}

	#[test]
	fn test_parse_error_is_reported() {
		let err = Config::from_str("[service\nid = 1").unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)));
	}
}
