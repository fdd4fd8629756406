//! Predicate composition for list queries.
//!
//! Each present filter field contributes one predicate; a query matches an
//! order only when every predicate does. Text search is a single predicate
//! that accepts a hit on any of the searchable fields.

use chrono::NaiveDateTime;
use pvz_types::{Order, OrderFilter, OrderStatus};

/// A single conjunctive condition on an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Predicate {
	Status(OrderStatus),
	/// Substring of the order number, client name or phone.
	AnyFieldContains(String),
	DateFrom(NaiveDateTime),
	DateTo(NaiveDateTime),
}

impl Predicate {
	fn matches(&self, order: &Order) -> bool {
		match self {
			Predicate::Status(status) => order.status == *status,
			Predicate::AnyFieldContains(needle) => order.matches_text(needle),
			Predicate::DateFrom(from) => order.order_date >= *from,
			Predicate::DateTo(to) => order.order_date <= *to,
		}
	}
}

/// Conjunction of predicates built from an [`OrderFilter`].
#[derive(Debug, Clone, Default)]
pub(crate) struct Query {
	predicates: Vec<Predicate>,
}

impl Query {
	pub(crate) fn from_filter(filter: &OrderFilter) -> Self {
		let mut query = Query::default();

		if let Some(status) = filter.status {
			query.push(Predicate::Status(status));
		}
		if let Some(text) = &filter.search_text {
			query.push(Predicate::AnyFieldContains(text.clone()));
		}
		if let Some(from) = filter.date_from {
			query.push(Predicate::DateFrom(from));
		}
		if let Some(to) = filter.date_to {
			query.push(Predicate::DateTo(to));
		}

		query
	}

	fn push(&mut self, predicate: Predicate) {
		self.predicates.push(predicate);
	}

	pub(crate) fn matches(&self, order: &Order) -> bool {
		self.predicates.iter().all(|p| p.matches(order))
	}

	#[cfg(test)]
	fn predicates(&self) -> &[Predicate] {
		&self.predicates
	}
}
