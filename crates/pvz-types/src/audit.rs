//! Audit trail entries kept alongside, not inside, order records.

use crate::OrderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditAction {
	Created,
	Issued,
	Cancelled,
	StatusChanged { from: OrderStatus, to: OrderStatus },
	Deleted,
}

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
	/// Unique entry id.
	pub id: String,
	/// Position in the log; increases with every recorded entry.
	#[serde(default)]
	pub sequence: u64,
	pub order_id: u64,
	pub action: AuditAction,
	/// Free-form context such as a cancellation reason.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub detail: Option<String>,
	pub recorded_at: DateTime<Utc>,
}
