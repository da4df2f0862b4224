//! Canonical event envelope, wire codec, and the domain event sum type shared
//! by every service that writes to or reads from the outbox / bus.
//!
//! This crate has no knowledge of Postgres or Kafka; it only knows how to
//! shape and (de)serialize events. Storage and transport live in
//! `transactional-outbox` and `bus-adapter` respectively.

pub mod domain;
pub mod envelope;

pub use domain::DomainEvent;
pub use envelope::{DecodeError, EventEnvelope, SchemaError, SCHEMA_VERSION};
