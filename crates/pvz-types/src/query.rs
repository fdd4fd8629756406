//! Query types: list filters and aggregate statistics.

use crate::OrderStatus;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while turning raw filter parameters into an [`OrderFilter`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
	#[error("Invalid status filter: {0}")]
	Status(String),
	#[error("Invalid date for '{field}': {value}")]
	Date { field: &'static str, value: String },
}

/// Optional, conjunctive predicates narrowing a list query.
///
/// Absent fields impose no constraint; an all-`None` filter selects
/// every order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
	/// Exact status match.
	pub status: Option<OrderStatus>,
	/// Substring of the order number, client name or phone.
	pub search_text: Option<String>,
	/// Inclusive lower bound on the order date.
	pub date_from: Option<NaiveDateTime>,
	/// Inclusive upper bound on the order date.
	pub date_to: Option<NaiveDateTime>,
}

impl OrderFilter {
	/// Filter that selects every order.
	pub fn all() -> Self {
		Self::default()
	}

	pub fn with_status(mut self, status: OrderStatus) -> Self {
		self.status = Some(status);
		self
	}

	pub fn with_search(mut self, text: impl Into<String>) -> Self {
		self.search_text = Some(text.into());
		self
	}

	pub fn with_date_from(mut self, from: NaiveDateTime) -> Self {
		self.date_from = Some(from);
		self
	}

	pub fn with_date_to(mut self, to: NaiveDateTime) -> Self {
		self.date_to = Some(to);
		self
	}

	/// True when no predicate is set.
	pub fn is_empty(&self) -> bool {
		self.status.is_none()
			&& self.search_text.is_none()
			&& self.date_from.is_none()
			&& self.date_to.is_none()
	}
}

/// Which end of a date range a bound describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
	From,
	To,
}

impl DateBound {
	fn field(self) -> &'static str {
		match self {
			DateBound::From => "date_from",
			DateBound::To => "date_to",
		}
	}
}

/// Parses a filter date bound.
///
/// Accepts `YYYY-MM-DD` or an ISO local date-time. A bare date expands to
/// the first instant of the day for [`DateBound::From`] and the last
/// instant of the day for [`DateBound::To`], so the whole day is included.
pub fn parse_date_bound(value: &str, bound: DateBound) -> Result<NaiveDateTime, FilterError> {
	let value = value.trim();

	for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
		if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
			return Ok(datetime);
		}
	}

	let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| FilterError::Date {
		field: bound.field(),
		value: value.to_string(),
	})?;

	Ok(match bound {
		DateBound::From => date.and_time(NaiveTime::MIN),
		DateBound::To => date.and_time(end_of_day()),
	})
}

fn end_of_day() -> NaiveTime {
	NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN)
}

/// Point-in-time aggregate over the whole order collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
	pub total_orders: usize,
	pub pending_orders: usize,
	pub ready_orders: usize,
	/// Orders handed out to clients.
	#[serde(rename = "completed_orders")]
	pub issued_orders: usize,
	pub cancelled_orders: usize,
	/// Orders registered on the current local calendar day.
	pub today_orders: usize,
	/// Sum of amounts over every order that is not cancelled.
	#[serde(with = "rust_decimal::serde::float")]
	pub total_amount: Decimal,
}

impl StatsSnapshot {
	/// Returns the count for a single status.
	pub fn count_for(&self, status: OrderStatus) -> usize {
		match status {
			OrderStatus::Pending => self.pending_orders,
			OrderStatus::Ready => self.ready_orders,
			OrderStatus::Issued => self.issued_orders,
			OrderStatus::Cancelled => self.cancelled_orders,
		}
	}

	pub(crate) fn count_mut(&mut self, status: OrderStatus) -> &mut usize {
		match status {
			OrderStatus::Pending => &mut self.pending_orders,
			OrderStatus::Ready => &mut self.ready_orders,
			OrderStatus::Issued => &mut self.issued_orders,
			OrderStatus::Cancelled => &mut self.cancelled_orders,
		}
	}

	/// Folds one order into the snapshot.
	pub fn record(&mut self, status: OrderStatus, amount: Decimal, is_today: bool) {
		self.total_orders += 1;
		*self.count_mut(status) += 1;
		if is_today {
			self.today_orders += 1;
		}
		if status != OrderStatus::Cancelled {
			self.total_amount += amount;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_date_only_bounds_cover_whole_day() {
		let from = parse_date_bound("2024-05-01", DateBound::From).unwrap();
		let to = parse_date_bound("2024-05-01", DateBound::To).unwrap();

		assert_eq!(from.to_string(), "2024-05-01 00:00:00");
		assert_eq!(to.date(), from.date());
		assert!(to > from);
		assert_eq!(to.time(), end_of_day());
	}

	#[test]
	fn test_datetime_bounds_are_kept_as_is() {
		let at = parse_date_bound("2024-05-01T12:30:00", DateBound::To).unwrap();
		assert_eq!(at.to_string(), "2024-05-01 12:30:00");

		let short = parse_date_bound("2024-05-01T12:30", DateBound::From).unwrap();
		assert_eq!(short, at);
	}

	#[test]
	fn test_invalid_date_names_the_field() {
		let err = parse_date_bound("yesterday", DateBound::To).unwrap_err();
		assert_eq!(
			err,
			FilterError::Date {
				field: "date_to",
				value: "yesterday".into()
			}
		);
	}

	#[test]
	fn test_stats_record_excludes_cancelled_amounts() {
		let mut stats = StatsSnapshot::default();
		stats.record(OrderStatus::Ready, Decimal::new(100, 0), true);
		stats.record(OrderStatus::Cancelled, Decimal::new(50, 0), false);
		stats.record(OrderStatus::Issued, Decimal::new(25, 0), false);

		assert_eq!(stats.total_orders, 3);
		assert_eq!(stats.count_for(OrderStatus::Ready), 1);
		assert_eq!(stats.count_for(OrderStatus::Cancelled), 1);
		assert_eq!(stats.today_orders, 1);
		assert_eq!(stats.total_amount, Decimal::new(125, 0));
	}

	#[test]
	fn test_stats_serializes_issued_as_completed() {
		let json = serde_json::to_value(StatsSnapshot::default()).unwrap();
		assert!(json.get("completed_orders").is_some());
		assert!(json.get("issued_orders").is_none());
	}

	#[test]
	fn test_stats_total_amount_is_a_number() {
		let mut stats = StatsSnapshot::default();
		stats.record(OrderStatus::Ready, Decimal::new(345050, 2), false);

		let json = serde_json::to_value(&stats).unwrap();
		assert!(json["total_amount"].is_number());
		assert_eq!(json["total_amount"].as_f64(), Some(3450.5));
	}
}
