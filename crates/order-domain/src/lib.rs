//! # Order Domain
//!
//! The canonical order aggregate: its shape, the state machines that
//! guard `status` and `paid_status`, the stock-override authorization path,
//! and the [`repository::OrderRepository`] that commits a mutation and its
//! outbox events atomically.
//!
//! Business rules live entirely in [`aggregate::Order`] and never touch
//! SQL; [`repository::SqlxOrderRepository`] is the only piece that knows
//! about Postgres.

pub mod aggregate;
pub mod error;
pub mod money;
pub mod repository;

pub use aggregate::{ActorRole, Order, OrderItem, OrderStatus, PaidStatus, StockOverrideRequest};
pub use error::{OrderError, OrderResult};
pub use repository::{OrderRepository, SqlxOrderRepository};
