//! Demonstration orders for a freshly created pickup point.

use crate::store::{OrderStore, StoreError};
use chrono::{Duration, Local};
use pvz_types::{NewOrder, OrderStatus};
use rust_decimal::Decimal;

/// (number, days ago, client, phone, status, amount in kopecks, delivery method)
const SAMPLE_ORDERS: [(&str, i64, &str, &str, OrderStatus, i64, &str); 6] = [
	("ORD-001", 2, "Иванов Иван Иванович", "+7 (999) 123-45-67", OrderStatus::Ready, 345_050, "Самовывоз"),
	("ORD-002", 1, "Петрова Анна Сергеевна", "+7 (999) 765-43-21", OrderStatus::Pending, 890_000, "Курьер"),
	("ORD-003", 0, "Сидоров Алексей Петрович", "+7 (999) 555-66-77", OrderStatus::Issued, 230_000, "Самовывоз"),
	("ORD-004", 3, "Козлова Елена Владимировна", "+7 (999) 111-22-33", OrderStatus::Cancelled, 560_000, "Самовывоз"),
	("ORD-005", 1, "Николаев Дмитрий Сергеевич", "+7 (999) 444-55-66", OrderStatus::Ready, 1_250_000, "Курьер"),
	("ORD-006", 0, "Соколова Мария Андреевна", "+7 (999) 777-88-99", OrderStatus::Pending, 430_050, "Самовывоз"),
];

const SAMPLE_PICKUP_POINT: &str = "ПВЗ №001";

/// Inserts the sample orders when the store is empty.
///
/// Returns how many orders were inserted; a non-empty store is left alone.
pub async fn seed_if_empty(store: &OrderStore) -> Result<usize, StoreError> {
	if !store.is_empty().await {
		tracing::debug!("Store already has orders, skipping sample data");
		return Ok(0);
	}

	let now = Local::now().naive_local();
	for (number, days_ago, client, phone, status, kopecks, delivery) in SAMPLE_ORDERS {
		let new = NewOrder {
			order_number: number.to_string(),
			client_name: client.to_string(),
			phone: phone.to_string(),
			status,
			amount: Decimal::new(kopecks, 2),
			delivery_method: delivery.to_string(),
			pickup_point: SAMPLE_PICKUP_POINT.to_string(),
		};
		store
			.insert_with_date(new, now - Duration::days(days_ago))
			.await?;
	}

	tracing::info!(orders = SAMPLE_ORDERS.len(), "Seeded sample orders");
	Ok(SAMPLE_ORDERS.len())
}
