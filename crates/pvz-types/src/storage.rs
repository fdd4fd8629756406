//! Storage-related types for the pickup-point service.

use std::str::FromStr;

/// Storage namespaces for the persisted collections.
///
/// Replaces string literals in storage calls with typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// One record per order, keyed by order id.
	Orders,
	/// Service bookkeeping such as the id sequence.
	Meta,
	/// Audit trail entries.
	Audit,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Meta => "meta",
			StorageKey::Audit => "audit",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Orders, Self::Meta, Self::Audit].into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"meta" => Ok(Self::Meta),
			"audit" => Ok(Self::Audit),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
