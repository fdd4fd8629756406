//! Core of the pickup-point order service.
//!
//! [`OrderStore`] owns the durable order collection and answers filtered
//! queries and statistics; [`OrderService`] applies the lifecycle rules on
//! top of it. [`PvzBuilder`] wires both to a storage backend chosen by
//! configuration and returns a [`PvzEngine`] shared by the HTTP layer.

pub mod audit;
pub mod builder;
pub mod engine;
pub mod seed;
pub mod service;
pub mod store;

pub use audit::AuditLog;
pub use builder::{BuilderError, PvzBuilder, PvzFactories};
pub use engine::{EngineError, PvzEngine};
pub use service::{OrderService, OrderServiceError};
pub use store::{OrderStore, StoreError, Transition};
