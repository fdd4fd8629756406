//! Engine that owns the order store and the services built on it.
//!
//! `PvzEngine` is created once at startup by [`crate::PvzBuilder`] and shared
//! by the HTTP layer. Besides holding the services it runs the periodic
//! storage cleanup task.

pub mod lifecycle;

use crate::service::OrderService;
use crate::store::OrderStore;
use pvz_config::Config;
use pvz_storage::StorageService;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

/// Process-wide handle on the order store and its services.
#[derive(Clone)]
pub struct PvzEngine {
	pub(crate) config: Config,
	pub(crate) storage: Arc<StorageService>,
	pub(crate) store: Arc<OrderStore>,
	pub(crate) service: Arc<OrderService>,
}

impl PvzEngine {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		store: Arc<OrderStore>,
		service: Arc<OrderService>,
	) -> Self {
		Self {
			config,
			storage,
			store,
			service,
		}
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns a reference to the storage service.
	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn store(&self) -> &Arc<OrderStore> {
		&self.store
	}

	/// Returns the lifecycle service handed to request handlers.
	pub fn service(&self) -> &Arc<OrderService> {
		&self.service
	}

	/// Spawns the task that periodically drops expired storage entries.
	///
	/// The task runs until the returned handle is aborted.
	pub fn spawn_storage_cleanup(&self) -> JoinHandle<()> {
		let storage = self.storage.clone();
		let mut interval = tokio::time::interval(Duration::from_secs(
			self.config.storage.cleanup_interval_seconds,
		));

		tokio::spawn(async move {
			loop {
				interval.tick().await;
				match storage.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Storage cleanup: removed {} expired entries", count);
					},
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					},
					_ => {},
				}
			}
		})
	}
}
