//! Webhook Ingestion Pipeline: per-source signature verification,
//! idempotency marking, normalization to a canonical [`event_schema::DomainEvent`],
//! and a dead-letter store for stage 3-5 failures.

pub mod dead_letter;
pub mod error;
pub mod idempotency;
pub mod signature;
pub mod sources;

pub use dead_letter::{DeadLetterRecord, DeadLetterStore};
pub use error::{WebhookError, WebhookResult};
pub use idempotency::WebhookIdempotencyStore;
pub use sources::NormalizedWebhook;
