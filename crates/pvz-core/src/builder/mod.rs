//! Builder pattern for constructing order engines.
//!
//! Composes a [`PvzEngine`] from configuration and storage factories: the
//! primary storage backend is created, the order store is loaded from it and
//! the lifecycle service is wired on top together with the audit log.

use crate::audit::AuditLog;
use crate::engine::PvzEngine;
use crate::service::OrderService;
use crate::store::OrderStore;
use pvz_config::Config;
use pvz_storage::{StorageError, StorageInterface, StorageService};
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
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Factory functions available to the builder, keyed by implementation name.
pub struct PvzFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

/// Builder for constructing a PvzEngine with a pluggable storage backend.
pub struct PvzBuilder {
	config: Config,
}

impl PvzBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine, loading every persisted order.
	pub async fn build<SF>(self, factories: PvzFactories<SF>) -> Result<PvzEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let primary = &self.config.storage.primary;

		for name in self.config.storage.implementations.keys() {
			if name != primary {
				tracing::info!(component = "storage", implementation = %name, enabled = false, "Configured");
			}
		}

		let primary_config = self
			.config
			.storage
			.implementations
			.get(primary)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Primary storage '{}' not found in implementations",
					primary
				))
			})?;

		let factory = factories.storage_factories.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("storage implementation '{}'", primary))
		})?;

		let backend = factory(primary_config).map_err(|e| {
			tracing::error!(
				component = "storage",
				implementation = %primary,
				error = %e,
				"Failed to create storage implementation"
			);
			BuilderError::Config(format!(
				"Failed to create storage implementation '{}': {}",
				primary, e
			))
		})?;
		tracing::info!(component = "storage", implementation = %primary, enabled = true, "Loaded");

		let storage = Arc::new(StorageService::new(backend));
		let store = Arc::new(
			OrderStore::open(storage.clone())
				.await
				.map_err(|e| BuilderError::Storage(e.to_string()))?,
		);
		let audit = Arc::new(AuditLog::new(storage.clone()));
		let service = Arc::new(OrderService::new(store.clone()).with_audit(audit));

		Ok(PvzEngine::new(self.config, storage, store, service))
	}
}
