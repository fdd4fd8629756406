//! Audit trail for order lifecycle events.
//!
//! Entries live in their own storage namespace, one record per event, so the
//! order record never carries audit-only data such as a cancellation reason.

use chrono::Utc;
use pvz_storage::{StorageError, StorageService};
use pvz_types::{AuditAction, AuditEntry, StorageKey};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Append-only log of lifecycle events.
pub struct AuditLog {
	storage: Arc<StorageService>,
	/// Next sequence number; loaded from storage on first write.
	next_sequence: Mutex<Option<u64>>,
}

impl AuditLog {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			next_sequence: Mutex::new(None),
		}
	}

	async fn load_next_sequence(&self) -> Result<u64, StorageError> {
		let last = self
			.storage
			.retrieve_all::<AuditEntry>(StorageKey::Audit.as_str())
			.await?
			.into_iter()
			.map(|(_, entry)| entry.sequence)
			.max()
			.unwrap_or(0);
		Ok(last + 1)
	}

	/// Appends one entry for `order_id`.
	pub async fn record(
		&self,
		order_id: u64,
		action: AuditAction,
		detail: Option<String>,
	) -> Result<AuditEntry, StorageError> {
		let mut next = self.next_sequence.lock().await;
		let sequence = match *next {
			Some(sequence) => sequence,
			None => self.load_next_sequence().await?,
		};
		// Burned even when the write fails.
		*next = Some(sequence + 1);

		let entry = AuditEntry {
			id: format!("{}-{}", order_id, Uuid::new_v4()),
			sequence,
			order_id,
			action,
			detail,
			recorded_at: Utc::now(),
		};

		self.storage
			.store(StorageKey::Audit.as_str(), &entry.id, &entry)
			.await?;
		Ok(entry)
	}

	/// Entries of one order, oldest first.
	pub async fn entries_for(&self, order_id: u64) -> Result<Vec<AuditEntry>, StorageError> {
		let prefix = format!("{}-", order_id);
		let mut entries: Vec<AuditEntry> = self
			.storage
			.retrieve_all::<AuditEntry>(StorageKey::Audit.as_str())
			.await?
			.into_iter()
			.filter(|(id, _)| id.starts_with(&prefix))
			.map(|(_, entry)| entry)
			.collect();

		entries.sort_by_key(|entry| (entry.sequence, entry.recorded_at));
		Ok(entries)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pvz_storage::implementations::memory::MemoryStorage;
	use pvz_types::OrderStatus;

	fn log() -> AuditLog {
		AuditLog::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	#[tokio::test]
	async fn test_entries_are_per_order_and_ordered() {
		let audit = log();

		audit.record(1, AuditAction::Created, None).await.unwrap();
		audit.record(11, AuditAction::Created, None).await.unwrap();
		audit
			.record(
				1,
				AuditAction::StatusChanged {
					from: OrderStatus::Pending,
					to: OrderStatus::Ready,
				},
				None,
			)
			.await
			.unwrap();
		audit
			.record(1, AuditAction::Cancelled, Some("customer request".into()))
			.await
			.unwrap();

		let entries = audit.entries_for(1).await.unwrap();

		assert_eq!(entries.len(), 3);
		assert!(entries.iter().all(|e| e.order_id == 1));
		assert_eq!(entries[0].action, AuditAction::Created);
		assert_eq!(entries[2].detail.as_deref(), Some("customer request"));
	}

	#[tokio::test]
	async fn test_entries_follow_recording_order_not_timestamps() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let audit = AuditLog::new(storage.clone());

		let created = audit.record(4, AuditAction::Created, None).await.unwrap();
		let issued = audit.record(4, AuditAction::Issued, None).await.unwrap();

		// Clock stepped back: the later event carries the earlier timestamp.
		let mut skewed = issued.clone();
		skewed.recorded_at = created.recorded_at - chrono::Duration::seconds(30);
		storage
			.store(StorageKey::Audit.as_str(), &skewed.id, &skewed)
			.await
			.unwrap();

		let entries = audit.entries_for(4).await.unwrap();
		assert_eq!(entries[0].action, AuditAction::Created);
		assert_eq!(entries[1].action, AuditAction::Issued);
		assert!(entries[0].sequence < entries[1].sequence);
	}

	#[tokio::test]
	async fn test_sequence_continues_after_reopen() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));

		let first = AuditLog::new(storage.clone());
		first.record(1, AuditAction::Created, None).await.unwrap();
		let last = first.record(1, AuditAction::Issued, None).await.unwrap();

		let reopened = AuditLog::new(storage);
		let next = reopened
			.record(1, AuditAction::Deleted, None)
			.await
			.unwrap();

		assert_eq!(next.sequence, last.sequence + 1);
	}

	#[tokio::test]
	async fn test_unknown_order_has_empty_trail() {
		assert!(log().entries_for(7).await.unwrap().is_empty());
	}
}
