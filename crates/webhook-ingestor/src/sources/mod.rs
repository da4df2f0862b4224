//! Per-source normalization: turn a source-specific JSON
//! shape into one canonical [`event_schema::DomainEvent`] plus the routing
//! metadata the outbox/bus needs.

pub mod facebook;
pub mod line;
pub mod loyverse;
pub mod payment_gateway;
pub mod delivery;

use event_schema::DomainEvent;

/// The result of normalizing one webhook body: a canonical event plus the
/// envelope routing fields that don't live on `DomainEvent` itself.
#[derive(Debug, Clone)]
pub struct NormalizedWebhook {
    pub event: DomainEvent,
    pub aggregate_id: String,
    pub aggregate_type: &'static str,
    /// Upstream-supplied id used for deduplication when present; callers
    /// fall back to a body fingerprint when a source omits one.
    pub upstream_event_id: Option<String>,
}
