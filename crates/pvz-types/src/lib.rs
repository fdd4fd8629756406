//! Common types module for the pickup-point order service.
//!
//! This module defines the data types shared by every crate of the
//! workspace: the order model, query filters and statistics, audit entries,
//! HTTP request/response shapes, storage namespaces and backend
//! configuration validation.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Audit trail types.
pub mod audit;
/// Order model and lifecycle status.
pub mod order;
/// List filters and aggregate statistics.
pub mod query;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Storage namespaces for persisted data.
pub mod storage;
/// Configuration validation types for pluggable backends.
pub mod validation;

pub use api::*;
pub use audit::*;
pub use order::*;
pub use query::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use validation::*;
