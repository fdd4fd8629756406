//! Order lifecycle operations.
//!
//! `OrderService` validates requests, applies the lifecycle rules and
//! delegates persistence to [`OrderStore`]. It holds no mutable state of its
//! own; every check-then-act happens inside a single store call so it is
//! atomic with respect to other writers.

use crate::audit::AuditLog;
use crate::store::{OrderStore, StoreError};
use pvz_types::{
	AuditAction, AuditEntry, CreateOrderRequest, NewOrder, Order, OrderFilter, OrderStatus,
	StatsSnapshot,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by order lifecycle operations.
#[derive(Debug, Error)]
pub enum OrderServiceError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for '{field}': {reason}")]
	InvalidField { field: String, reason: String },
	#[error("Order number already exists: {0}")]
	DuplicateKey(String),
	#[error("Order not found: {0}")]
	NotFound(u64),
	#[error("Order {id} is already {status}")]
	AlreadyTerminal { id: u64, status: OrderStatus },
	#[error("Invalid status: {0}")]
	InvalidStatus(String),
	#[error("Only cancelled orders may be deleted; order {id} is {status}")]
	InvalidState { id: u64, status: OrderStatus },
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StoreError> for OrderServiceError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NotFound(id) => OrderServiceError::NotFound(id),
			StoreError::DuplicateKey(number) => OrderServiceError::DuplicateKey(number),
			StoreError::Storage(msg) => OrderServiceError::Storage(msg),
		}
	}
}

/// Lifecycle and query operations over the order collection.
pub struct OrderService {
	store: Arc<OrderStore>,
	audit: Option<Arc<AuditLog>>,
}

impl OrderService {
	pub fn new(store: Arc<OrderStore>) -> Self {
		Self { store, audit: None }
	}

	/// Attaches an audit log that records every lifecycle event.
	pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
		self.audit = Some(audit);
		self
	}

	pub fn store(&self) -> &Arc<OrderStore> {
		&self.store
	}

	/// Validates a creation request and stores the new order.
	///
	/// Required fields are checked in a fixed order and the first missing one
	/// is reported. The status defaults to `Pending`.
	pub async fn create_order(
		&self,
		request: CreateOrderRequest,
	) -> Result<Order, OrderServiceError> {
		let new = validate_new_order(request)?;

		let order = self.store.insert(new).await.inspect_err(|e| {
			tracing::warn!(error = %e, "Order creation rejected");
		})?;

		tracing::info!(
			order_id = order.id,
			order_number = %order.order_number,
			status = %order.status,
			"Order created"
		);
		self.audit(order.id, AuditAction::Created, None).await;
		Ok(order)
	}

	pub async fn list_orders(&self, filter: &OrderFilter) -> Vec<Order> {
		self.store.list(filter).await
	}

	pub async fn get_order(&self, id: u64) -> Result<Order, OrderServiceError> {
		Ok(self.store.get(id).await?)
	}

	pub async fn get_stats(&self) -> StatsSnapshot {
		self.store.stats().await
	}

	/// Hands an order to the client. Fails on issued or cancelled orders.
	pub async fn issue_order(&self, id: u64) -> Result<Order, OrderServiceError> {
		let transition = self
			.store
			.transition::<OrderServiceError, _>(id, |order| {
				reject_terminal(order)?;
				Ok(OrderStatus::Issued)
			})
			.await
			.inspect_err(|e| tracing::warn!(order_id = id, error = %e, "Issue rejected"))?;

		tracing::info!(
			order_id = id,
			from = %transition.previous,
			status = %OrderStatus::Issued,
			"Order issued"
		);
		self.audit(id, AuditAction::Issued, None).await;
		Ok(transition.order)
	}

	/// Cancels an order. The reason only goes to the audit log.
	pub async fn cancel_order(
		&self,
		id: u64,
		reason: Option<String>,
	) -> Result<Order, OrderServiceError> {
		let transition = self
			.store
			.transition::<OrderServiceError, _>(id, |order| {
				reject_terminal(order)?;
				Ok(OrderStatus::Cancelled)
			})
			.await
			.inspect_err(|e| tracing::warn!(order_id = id, error = %e, "Cancel rejected"))?;

		tracing::info!(
			order_id = id,
			from = %transition.previous,
			status = %OrderStatus::Cancelled,
			reason = reason.as_deref().unwrap_or(""),
			"Order cancelled"
		);
		self.audit(id, AuditAction::Cancelled, reason).await;
		Ok(transition.order)
	}

	/// Sets any of the four statuses, terminal or not.
	///
	/// Unlike issue and cancel this does not refuse terminal orders; it is
	/// the administrative correction path. The status is parsed before the
	/// order is looked up.
	pub async fn set_order_status(
		&self,
		id: u64,
		status: &str,
	) -> Result<Order, OrderServiceError> {
		let status: OrderStatus = status
			.parse()
			.map_err(|_| OrderServiceError::InvalidStatus(status.to_string()))?;

		let transition = self.store.update_status(id, status).await?;

		tracing::info!(
			order_id = id,
			from = %transition.previous,
			status = %status,
			"Order status set"
		);
		self.audit(
			id,
			AuditAction::StatusChanged {
				from: transition.previous,
				to: status,
			},
			None,
		)
		.await;
		Ok(transition.order)
	}

	/// Permanently removes a cancelled order.
	pub async fn delete_order(&self, id: u64) -> Result<Order, OrderServiceError> {
		let removed = self
			.store
			.delete_if::<OrderServiceError, _>(id, |order| {
				if order.status != OrderStatus::Cancelled {
					return Err(OrderServiceError::InvalidState {
						id,
						status: order.status,
					});
				}
				Ok(())
			})
			.await
			.inspect_err(|e| tracing::warn!(order_id = id, error = %e, "Delete rejected"))?;

		tracing::info!(order_id = id, order_number = %removed.order_number, "Order deleted");
		self.audit(id, AuditAction::Deleted, None).await;
		Ok(removed)
	}

	/// Audit entries of an order, oldest first.
	///
	/// A deleted order keeps its trail. An id with no trail and no order is
	/// reported as not found.
	pub async fn audit_trail(&self, id: u64) -> Result<Vec<AuditEntry>, OrderServiceError> {
		let entries = match &self.audit {
			Some(audit) => audit
				.entries_for(id)
				.await
				.map_err(|e| OrderServiceError::Storage(e.to_string()))?,
			None => Vec::new(),
		};

		if entries.is_empty() {
			self.store.get(id).await?;
		}
		Ok(entries)
	}

	async fn audit(&self, order_id: u64, action: AuditAction, detail: Option<String>) {
		let Some(audit) = &self.audit else {
			return;
		};
		if let Err(e) = audit.record(order_id, action, detail).await {
			tracing::error!(order_id, error = %e, "Failed to record audit entry");
		}
	}
}

fn reject_terminal(order: &Order) -> Result<(), OrderServiceError> {
	if order.status.is_terminal() {
		return Err(OrderServiceError::AlreadyTerminal {
			id: order.id,
			status: order.status,
		});
	}
	Ok(())
}

fn required(field: &str, value: Option<String>) -> Result<String, OrderServiceError> {
	match value {
		Some(v) if !v.trim().is_empty() => Ok(v),
		_ => Err(OrderServiceError::MissingField(field.to_string())),
	}
}

fn validate_new_order(request: CreateOrderRequest) -> Result<NewOrder, OrderServiceError> {
	let order_number = required("order_number", request.order_number)?;
	let client_name = required("client_name", request.client_name)?;
	let phone = required("phone", request.phone)?;
	let amount = request
		.amount
		.ok_or_else(|| OrderServiceError::MissingField("amount".into()))?;
	let delivery_method = required("delivery_method", request.delivery_method)?;
	let pickup_point = required("pickup_point", request.pickup_point)?;

	if amount < Decimal::ZERO {
		return Err(OrderServiceError::InvalidField {
			field: "amount".into(),
			reason: "must not be negative".into(),
		});
	}

	let status = match request.status.as_deref().map(str::trim) {
		None | Some("") => OrderStatus::Pending,
		Some(raw) => raw
			.parse()
			.map_err(|_| OrderServiceError::InvalidStatus(raw.to_string()))?,
	};

	Ok(NewOrder {
		order_number,
		client_name,
		phone,
		status,
		amount,
		delivery_method,
		pickup_point,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use pvz_storage::implementations::memory::MemoryStorage;
	use pvz_storage::StorageService;

	async fn service() -> OrderService {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let store = Arc::new(OrderStore::open(storage.clone()).await.unwrap());
		OrderService::new(store).with_audit(Arc::new(AuditLog::new(storage)))
	}

	fn request(number: &str, client: &str) -> CreateOrderRequest {
		CreateOrderRequest {
			order_number: Some(number.into()),
			client_name: Some(client.into()),
			phone: Some("+7 (999) 123-45-67".into()),
			amount: Some(Decimal::new(1000, 0)),
			delivery_method: Some("Самовывоз".into()),
			pickup_point: Some("ПВЗ №001".into()),
			status: None,
		}
	}

	fn with_status(mut request: CreateOrderRequest, status: &str) -> CreateOrderRequest {
		request.status = Some(status.into());
		request
	}

	#[tokio::test]
	async fn test_issue_twice_reports_terminal_status() {
		let service = service().await;
		let order = service.create_order(request("ORD-100", "Ivan")).await.unwrap();
		assert_eq!(order.status, OrderStatus::Pending);
		assert_eq!(order.amount, Decimal::new(1000, 0));

		let issued = service.issue_order(order.id).await.unwrap();
		assert_eq!(issued.status, OrderStatus::Issued);

		let err = service.issue_order(order.id).await.unwrap_err();
		assert!(matches!(
			err,
			OrderServiceError::AlreadyTerminal {
				status: OrderStatus::Issued,
				..
			}
		));
	}

	#[tokio::test]
	async fn test_cancel_then_delete_then_not_found() {
		let service = service().await;
		let order = service.create_order(request("ORD-101", "Anna")).await.unwrap();

		let cancelled = service
			.cancel_order(order.id, Some("customer request".into()))
			.await
			.unwrap();
		assert_eq!(cancelled.status, OrderStatus::Cancelled);

		service.delete_order(order.id).await.unwrap();
		assert!(matches!(
			service.get_order(order.id).await,
			Err(OrderServiceError::NotFound(id)) if id == order.id
		));
	}

	#[tokio::test]
	async fn test_duplicate_number_keeps_single_order() {
		let service = service().await;
		service.create_order(request("ORD-1", "Ivan")).await.unwrap();

		let err = service
			.create_order(request("ORD-1", "Anna"))
			.await
			.unwrap_err();

		assert!(matches!(err, OrderServiceError::DuplicateKey(n) if n == "ORD-1"));
		assert_eq!(service.list_orders(&OrderFilter::all()).await.len(), 1);
	}

	#[tokio::test]
	async fn test_missing_fields_reported_in_order() {
		let service = service().await;

		let mut req = request("ORD-1", "Ivan");
		req.phone = None;
		req.pickup_point = None;
		assert!(matches!(
			service.create_order(req).await,
			Err(OrderServiceError::MissingField(f)) if f == "phone"
		));

		let mut req = request("ORD-1", "   ");
		req.amount = None;
		assert!(matches!(
			service.create_order(req).await,
			Err(OrderServiceError::MissingField(f)) if f == "client_name"
		));

		let mut req = request("ORD-1", "Ivan");
		req.amount = None;
		assert!(matches!(
			service.create_order(req).await,
			Err(OrderServiceError::MissingField(f)) if f == "amount"
		));
	}

	#[tokio::test]
	async fn test_negative_amount_rejected() {
		let service = service().await;
		let mut req = request("ORD-1", "Ivan");
		req.amount = Some(Decimal::new(-1, 0));

		assert!(matches!(
			service.create_order(req).await,
			Err(OrderServiceError::InvalidField { field, .. }) if field == "amount"
		));
		assert!(service.store().is_empty().await);
	}

	#[tokio::test]
	async fn test_create_with_initial_status() {
		let service = service().await;

		let ready = service
			.create_order(with_status(request("ORD-1", "Ivan"), "Готов к выдаче"))
			.await
			.unwrap();
		assert_eq!(ready.status, OrderStatus::Ready);

		let err = service
			.create_order(with_status(request("ORD-2", "Ivan"), "Lost"))
			.await
			.unwrap_err();
		assert!(matches!(err, OrderServiceError::InvalidStatus(s) if s == "Lost"));
	}

	#[tokio::test]
	async fn test_cancel_refuses_terminal_orders() {
		let service = service().await;
		let order = service.create_order(request("ORD-1", "Ivan")).await.unwrap();
		service.cancel_order(order.id, None).await.unwrap();

		assert!(matches!(
			service.cancel_order(order.id, None).await,
			Err(OrderServiceError::AlreadyTerminal {
				status: OrderStatus::Cancelled,
				..
			})
		));
		assert!(matches!(
			service.issue_order(order.id).await,
			Err(OrderServiceError::AlreadyTerminal {
				status: OrderStatus::Cancelled,
				..
			})
		));
	}

	#[tokio::test]
	async fn test_issue_and_cancel_missing_order() {
		let service = service().await;
		assert!(matches!(
			service.issue_order(5).await,
			Err(OrderServiceError::NotFound(5))
		));
		assert!(matches!(
			service.cancel_order(5, None).await,
			Err(OrderServiceError::NotFound(5))
		));
	}

	#[tokio::test]
	async fn test_delete_requires_cancelled() {
		let service = service().await;
		for status in ["Pending", "Ready", "Issued"] {
			let order = service
				.create_order(with_status(request(&format!("ORD-{}", status), "x"), status))
				.await
				.unwrap();
			assert!(matches!(
				service.delete_order(order.id).await,
				Err(OrderServiceError::InvalidState { .. })
			));
		}
		assert_eq!(service.store().len().await, 3);
		assert!(matches!(
			service.delete_order(42).await,
			Err(OrderServiceError::NotFound(42))
		));
	}

	#[tokio::test]
	async fn test_set_status_overrides_terminal_state() {
		let service = service().await;
		let order = service.create_order(request("ORD-1", "Ivan")).await.unwrap();
		service.issue_order(order.id).await.unwrap();

		let reopened = service
			.set_order_status(order.id, "Pending")
			.await
			.unwrap();
		assert_eq!(reopened.status, OrderStatus::Pending);

		service.set_order_status(order.id, "cancelled").await.unwrap();
		service.delete_order(order.id).await.unwrap();
	}

	#[tokio::test]
	async fn test_set_status_checks_value_before_existence() {
		let service = service().await;

		assert!(matches!(
			service.set_order_status(9, "Shipped").await,
			Err(OrderServiceError::InvalidStatus(s)) if s == "Shipped"
		));
		assert!(matches!(
			service.set_order_status(9, "Ready").await,
			Err(OrderServiceError::NotFound(9))
		));
	}

	#[tokio::test]
	async fn test_ready_and_search_filter_intersects() {
		let service = service().await;
		service
			.create_order(with_status(request("ORD-1", "Ivanov Ivan"), "Ready"))
			.await
			.unwrap();
		service
			.create_order(request("ORD-2", "Ivanova Maria"))
			.await
			.unwrap();
		service
			.create_order(with_status(request("ORD-3", "Petrova Anna"), "Ready"))
			.await
			.unwrap();

		let found = service
			.list_orders(
				&OrderFilter::all()
					.with_status(OrderStatus::Ready)
					.with_search("Ivan"),
			)
			.await;

		assert_eq!(found.len(), 1);
		assert_eq!(found[0].order_number, "ORD-1");
	}

	#[tokio::test]
	async fn test_stats_total_matches_list() {
		let service = service().await;
		let a = service.create_order(request("ORD-1", "x")).await.unwrap();
		service.create_order(request("ORD-2", "x")).await.unwrap();
		service.cancel_order(a.id, None).await.unwrap();

		let stats = service.get_stats().await;
		assert_eq!(
			stats.total_orders,
			service.list_orders(&OrderFilter::all()).await.len()
		);
		assert_eq!(stats.cancelled_orders, 1);
		assert_eq!(stats.pending_orders, 1);
		assert_eq!(stats.total_amount, Decimal::new(1000, 0));
	}

	#[tokio::test]
	async fn test_audit_trail_records_lifecycle() {
		let service = service().await;
		let order = service.create_order(request("ORD-1", "x")).await.unwrap();
		service
			.set_order_status(order.id, "Ready")
			.await
			.unwrap();
		service
			.cancel_order(order.id, Some("customer request".into()))
			.await
			.unwrap();
		service.delete_order(order.id).await.unwrap();

		let trail = service.audit_trail(order.id).await.unwrap();
		let actions: Vec<_> = trail.iter().map(|e| e.action.clone()).collect();

		assert_eq!(
			actions,
			vec![
				AuditAction::Created,
				AuditAction::StatusChanged {
					from: OrderStatus::Pending,
					to: OrderStatus::Ready,
				},
				AuditAction::Cancelled,
				AuditAction::Deleted,
			]
		);
		assert_eq!(trail[2].detail.as_deref(), Some("customer request"));
		assert!(service.get_order(order.id).await.is_err());
	}

	#[tokio::test]
	async fn test_audit_trail_unknown_order() {
		let service = service().await;
		assert!(matches!(
			service.audit_trail(3).await,
			Err(OrderServiceError::NotFound(3))
		));
	}

	#[tokio::test]
	async fn test_concurrent_issue_has_single_winner() {
		let service = Arc::new(service().await);
		let id = service.create_order(request("ORD-1", "x")).await.unwrap().id;

		let handles: Vec<_> = (0..8)
			.map(|_| {
				let service = service.clone();
				tokio::spawn(async move { service.issue_order(id).await })
			})
			.collect();

		let mut successes = 0;
		for handle in handles {
			if handle.await.unwrap().is_ok() {
				successes += 1;
			}
		}
		assert_eq!(successes, 1);
	}
}
