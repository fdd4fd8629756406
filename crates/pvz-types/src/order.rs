//! Order types for the pickup-point service.
//!
//! This module defines the order record, its lifecycle status and the
//! validated payload used to create new orders.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle status of an order.
///
/// `Issued` and `Cancelled` are terminal for the issue/cancel operations.
/// Deserialization also accepts the Russian labels stored by older
/// deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
	/// Order registered, waiting for the parcel to arrive.
	#[serde(alias = "Ожидает выдачи")]
	Pending,
	/// Parcel is at the pickup point and can be handed out.
	#[serde(alias = "Готов к выдаче")]
	Ready,
	/// Parcel handed to the client.
	#[serde(alias = "Выдан")]
	Issued,
	/// Order cancelled.
	#[serde(alias = "Отменен")]
	Cancelled,
}

impl OrderStatus {
	/// Every status, in lifecycle order.
	pub const ALL: [OrderStatus; 4] = [
		OrderStatus::Pending,
		OrderStatus::Ready,
		OrderStatus::Issued,
		OrderStatus::Cancelled,
	];

	/// Returns the canonical wire name of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "Pending",
			OrderStatus::Ready => "Ready",
			OrderStatus::Issued => "Issued",
			OrderStatus::Cancelled => "Cancelled",
		}
	}

	/// Returns the label shown to pickup-point operators.
	pub fn label(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "Ожидает выдачи",
			OrderStatus::Ready => "Готов к выдаче",
			OrderStatus::Issued => "Выдан",
			OrderStatus::Cancelled => "Отменен",
		}
	}

	/// Whether issue/cancel are no longer allowed from this status.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Issued | OrderStatus::Cancelled)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when a string is not one of the four known statuses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for OrderStatus {
	type Err = ParseStatusError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();
		OrderStatus::ALL
			.into_iter()
			.find(|status| {
				status.as_str().eq_ignore_ascii_case(trimmed) || status.label() == trimmed
			})
			.ok_or_else(|| ParseStatusError(s.to_string()))
	}
}

/// A pickup-point order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// System-assigned identifier, never reused.
	pub id: u64,
	/// Caller-assigned order number, unique across all orders.
	pub order_number: String,
	/// Local time the order was registered.
	pub order_date: NaiveDateTime,
	pub client_name: String,
	pub phone: String,
	pub status: OrderStatus,
	/// Order value, never negative. Sent as a JSON number.
	#[serde(with = "rust_decimal::serde::float")]
	pub amount: Decimal,
	pub delivery_method: String,
	pub pickup_point: String,
}

impl Order {
	/// Builds a stored order from a validated payload.
	pub fn from_new(id: u64, order_date: NaiveDateTime, new: NewOrder) -> Self {
		Self {
			id,
			order_number: new.order_number,
			order_date,
			client_name: new.client_name,
			phone: new.phone,
			status: new.status,
			amount: new.amount,
			delivery_method: new.delivery_method,
			pickup_point: new.pickup_point,
		}
	}

	/// Case-sensitive substring match against number, client name or phone.
	pub fn matches_text(&self, needle: &str) -> bool {
		self.order_number.contains(needle)
			|| self.client_name.contains(needle)
			|| self.phone.contains(needle)
	}
}

/// Validated payload for a new order.
///
/// Produced by the service layer once every required field is present;
/// the store assigns the id and the order date.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
	pub order_number: String,
	pub client_name: String,
	pub phone: String,
	pub status: OrderStatus,
	pub amount: Decimal,
	pub delivery_method: String,
	pub pickup_point: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_parsing_accepts_names_and_labels() {
		assert_eq!("Ready".parse::<OrderStatus>().unwrap(), OrderStatus::Ready);
		assert_eq!("issued".parse::<OrderStatus>().unwrap(), OrderStatus::Issued);
		assert_eq!(
			"Ожидает выдачи".parse::<OrderStatus>().unwrap(),
			OrderStatus::Pending
		);
		assert_eq!(
			"Отменен".parse::<OrderStatus>().unwrap(),
			OrderStatus::Cancelled
		);
		assert!("Shipped".parse::<OrderStatus>().is_err());
		assert!("".parse::<OrderStatus>().is_err());
	}

	#[test]
	fn test_terminal_statuses() {
		assert!(!OrderStatus::Pending.is_terminal());
		assert!(!OrderStatus::Ready.is_terminal());
		assert!(OrderStatus::Issued.is_terminal());
		assert!(OrderStatus::Cancelled.is_terminal());
	}

	#[test]
	fn test_status_serde_uses_names_and_reads_labels() {
		let json = serde_json::to_string(&OrderStatus::Cancelled).unwrap();
		assert_eq!(json, "\"Cancelled\"");

		let legacy: OrderStatus = serde_json::from_str("\"Готов к выдаче\"").unwrap();
		assert_eq!(legacy, OrderStatus::Ready);
	}

	#[test]
	fn test_text_match_is_case_sensitive() {
		let order = Order {
			id: 1,
			order_number: "ORD-001".into(),
			order_date: chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
				.unwrap()
				.and_hms_opt(10, 0, 0)
				.unwrap(),
			client_name: "Ivanov Ivan".into(),
			phone: "+7 (999) 123-45-67".into(),
			status: OrderStatus::Ready,
			amount: Decimal::new(345050, 2),
			delivery_method: "Pickup".into(),
			pickup_point: "PVZ #001".into(),
		};

		assert!(order.matches_text("ORD-0"));
		assert!(order.matches_text("Ivan"));
		assert!(order.matches_text("123-45"));
		assert!(!order.matches_text("ivan"));
	}

	fn sample_order() -> Order {
		Order {
			id: 2,
			order_number: "ORD-002".into(),
			order_date: chrono::NaiveDate::from_ymd_opt(2024, 5, 2)
				.unwrap()
				.and_hms_opt(9, 30, 0)
				.unwrap(),
			client_name: "Petrova Anna".into(),
			phone: "+7 (999) 765-43-21".into(),
			status: OrderStatus::Pending,
			amount: Decimal::new(345050, 2),
			delivery_method: "Courier".into(),
			pickup_point: "PVZ #002".into(),
		}
	}

	#[test]
	fn test_amount_serializes_as_number() {
		let json = serde_json::to_value(sample_order()).unwrap();

		assert!(json["amount"].is_number());
		assert_eq!(json["amount"].as_f64(), Some(3450.5));
	}

	#[test]
	fn test_amount_reads_numbers_and_strings() {
		let mut json = serde_json::to_value(sample_order()).unwrap();
		let order: Order = serde_json::from_value(json.clone()).unwrap();
		assert_eq!(order.amount, Decimal::new(34505, 1));

		json["amount"] = serde_json::json!("120.25");
		let order: Order = serde_json::from_value(json).unwrap();
		assert_eq!(order.amount, Decimal::new(12025, 2));
	}
}
