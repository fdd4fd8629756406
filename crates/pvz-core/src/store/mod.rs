//! Durable order collection.
//!
//! `OrderStore` keeps every order in memory for reads and is the only writer
//! of the `orders` and `meta` storage namespaces. Writes reach storage before
//! the in-memory view changes, so a failed write leaves the store as it was.

mod query;

use chrono::{Local, NaiveDate, NaiveDateTime};
use pvz_storage::{StorageError, StorageService};
use pvz_types::{NewOrder, Order, OrderFilter, OrderStatus, StatsSnapshot, StorageKey};
use query::Query;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Storage id of the persisted id sequence in the `meta` namespace.
const SEQUENCE_ID: &str = "sequence";

/// Errors that can occur in order store operations.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("Order not found: {0}")]
	NotFound(u64),
	#[error("Order number already exists: {0}")]
	DuplicateKey(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StorageError> for StoreError {
	fn from(err: StorageError) -> Self {
		StoreError::Storage(err.to_string())
	}
}

/// Result of a status transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
	/// Status before the change.
	pub previous: OrderStatus,
	/// The order as persisted after the change.
	pub order: Order,
}

#[derive(Debug, Default)]
struct StoreState {
	/// Keyed by id; ids grow monotonically so iteration is insertion order.
	orders: BTreeMap<u64, Order>,
	numbers: HashMap<String, u64>,
	next_id: u64,
}

/// Owner of the order collection.
pub struct OrderStore {
	storage: Arc<StorageService>,
	state: RwLock<StoreState>,
}

impl OrderStore {
	/// Loads every persisted order and the id sequence.
	pub async fn open(storage: Arc<StorageService>) -> Result<Self, StoreError> {
		let records: Vec<(String, Order)> =
			storage.retrieve_all(StorageKey::Orders.as_str()).await?;

		let mut state = StoreState::default();
		for (key, order) in records {
			if let Some(existing) = state.numbers.get(&order.order_number) {
				tracing::warn!(
					order_id = order.id,
					conflicts_with = existing,
					order_number = %order.order_number,
					storage_key = %key,
					"Skipping stored order with duplicate order number"
				);
				continue;
			}
			state.numbers.insert(order.order_number.clone(), order.id);
			state.orders.insert(order.id, order);
		}

		let stored_sequence = match storage
			.retrieve::<u64>(StorageKey::Meta.as_str(), SEQUENCE_ID)
			.await
		{
			Ok(next) => next,
			Err(StorageError::NotFound) => 1,
			Err(e) => return Err(e.into()),
		};
		let after_max = state
			.orders
			.keys()
			.next_back()
			.map_or(1, |max| max.saturating_add(1));
		state.next_id = stored_sequence.max(after_max).max(1);

		tracing::info!(
			orders = state.orders.len(),
			next_id = state.next_id,
			"Order store opened"
		);

		Ok(Self {
			storage,
			state: RwLock::new(state),
		})
	}

	/// Inserts a new order dated now (local time) and returns it.
	pub async fn insert(&self, new: NewOrder) -> Result<Order, StoreError> {
		self.insert_with_date(new, Local::now().naive_local()).await
	}

	/// Inserts a new order with an explicit order date.
	pub async fn insert_with_date(
		&self,
		new: NewOrder,
		order_date: NaiveDateTime,
	) -> Result<Order, StoreError> {
		let mut state = self.state.write().await;

		if state.numbers.contains_key(&new.order_number) {
			return Err(StoreError::DuplicateKey(new.order_number));
		}

		let id = state.next_id;
		let next_id = id.saturating_add(1);

		// Sequence before record: a failed record write only burns the id.
		self.storage
			.store(StorageKey::Meta.as_str(), SEQUENCE_ID, &next_id)
			.await?;
		state.next_id = next_id;

		let order = Order::from_new(id, order_date, new);
		self.storage
			.store(StorageKey::Orders.as_str(), &id.to_string(), &order)
			.await?;

		state.numbers.insert(order.order_number.clone(), id);
		state.orders.insert(id, order.clone());

		tracing::debug!(order_id = id, order_number = %order.order_number, "Order persisted");
		Ok(order)
	}

	pub async fn get(&self, id: u64) -> Result<Order, StoreError> {
		let state = self.state.read().await;
		state.orders.get(&id).cloned().ok_or(StoreError::NotFound(id))
	}

	/// Orders matching every present filter field, newest first.
	///
	/// Orders with the same date keep insertion order.
	pub async fn list(&self, filter: &OrderFilter) -> Vec<Order> {
		let query = Query::from_filter(filter);
		let state = self.state.read().await;

		let mut orders: Vec<Order> = state
			.orders
			.values()
			.filter(|order| query.matches(order))
			.cloned()
			.collect();
		orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
		orders
	}

	/// Sets the status of an order unconditionally.
	pub async fn update_status(
		&self,
		id: u64,
		status: OrderStatus,
	) -> Result<Transition, StoreError> {
		self.transition(id, |_| Ok::<_, StoreError>(status)).await
	}

	/// Changes an order's status as decided by `decide`.
	///
	/// `decide` sees the current order under the write lock; an error from it
	/// is returned as is and nothing is written.
	pub async fn transition<E, F>(&self, id: u64, decide: F) -> Result<Transition, E>
	where
		E: From<StoreError>,
		F: FnOnce(&Order) -> Result<OrderStatus, E>,
	{
		let mut state = self.state.write().await;

		let current = state.orders.get(&id).ok_or(StoreError::NotFound(id))?;
		let status = decide(current)?;

		let mut updated = current.clone();
		let previous = updated.status;
		updated.status = status;

		self.storage
			.store(StorageKey::Orders.as_str(), &id.to_string(), &updated)
			.await
			.map_err(StoreError::from)?;
		state.orders.insert(id, updated.clone());

		Ok(Transition {
			previous,
			order: updated,
		})
	}

	/// Removes an order unconditionally.
	pub async fn delete(&self, id: u64) -> Result<Order, StoreError> {
		self.delete_if(id, |_| Ok::<_, StoreError>(())).await
	}

	/// Removes an order when `check` accepts it, returning the removed order.
	pub async fn delete_if<E, F>(&self, id: u64, check: F) -> Result<Order, E>
	where
		E: From<StoreError>,
		F: FnOnce(&Order) -> Result<(), E>,
	{
		let mut state = self.state.write().await;

		let current = state.orders.get(&id).ok_or(StoreError::NotFound(id))?;
		check(current)?;

		self.storage
			.remove(StorageKey::Orders.as_str(), &id.to_string())
			.await
			.map_err(StoreError::from)?;

		let removed = state.orders.remove(&id).ok_or(StoreError::NotFound(id))?;
		state.numbers.remove(&removed.order_number);
		Ok(removed)
	}

	/// Aggregates over the whole collection, counting today by local date.
	pub async fn stats(&self) -> StatsSnapshot {
		self.stats_for_day(Local::now().date_naive()).await
	}

	/// Aggregates over the whole collection with an explicit "today".
	pub async fn stats_for_day(&self, today: NaiveDate) -> StatsSnapshot {
		let state = self.state.read().await;
		state
			.orders
			.values()
			.fold(StatsSnapshot::default(), |mut stats, order| {
				stats.record(order.status, order.amount, order.order_date.date() == today);
				stats
			})
	}

	pub async fn len(&self) -> usize {
		self.state.read().await.orders.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.state.read().await.orders.is_empty()
	}
}
