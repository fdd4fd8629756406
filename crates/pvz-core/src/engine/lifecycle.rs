//! Startup and shutdown steps for the engine.

use super::{EngineError, PvzEngine};
use crate::seed;

impl PvzEngine {
	/// Performs any initialization required before serving requests.
	///
	/// Seeds sample orders into an empty store when the configuration asks
	/// for it.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		tracing::info!(service_id = %self.config.service.id, "Initializing order engine");

		if self.config.service.seed_sample_data {
			seed::seed_if_empty(&self.store)
				.await
				.map_err(|e| EngineError::Service(format!("Failed to seed sample data: {}", e)))?;
		}

		Ok(())
	}

	/// Performs cleanup operations.
	///
	/// The storage backend, and the file lock it may hold, is released when
	/// the last engine handle is dropped.
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!(
			service_id = %self.config.service.id,
			orders = self.store.len().await,
			"Shutting down order engine"
		);
		Ok(())
	}
}
