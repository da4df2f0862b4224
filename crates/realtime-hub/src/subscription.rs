use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque id for a registered WebSocket client. Callers (the websocket
/// actor in the realtime-gateway service) carry only this id, never a
/// reference into the hub's internal map, keeping the subscriber registry
/// single-owner instead of cyclic.
pub type SubscriberId = Uuid;

/// A message handed to a subscriber's outbound queue. `subject` is kept
/// alongside the payload so a client fanning in multiple conversations can
/// tell them apart without re-parsing `payload`.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub subject: String,
    pub payload: serde_json::Value,
}

/// What a subscription admits. The hub matches a broadcast's `subject`
/// string against this filter; everything else about the message is
/// opaque to the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectFilter {
    Conversation(String),
    User(String),
    /// Matches every subject; used by operator/monitoring connections.
    All,
}

impl SubjectFilter {
    pub fn admits(&self, subject: &str) -> bool {
        match self {
            SubjectFilter::Conversation(id) => subject == format!("conversation:{id}"),
            SubjectFilter::User(id) => subject == format!("user:{id}"),
            SubjectFilter::All => true,
        }
    }
}

/// One registered subscriber as the hub loop sees it: its filter, its
/// bounded outbound queue, and the last time it proved liveness (pong or
/// inbound frame). Mutated only from the hub's own task — the subscriber
/// map is never shared behind a lock.
pub struct Subscription {
    pub subscriber_id: SubscriberId,
    pub subject_filter: SubjectFilter,
    pub queue_tx: mpsc::Sender<OutboundMessage>,
    pub last_ping_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(subscriber_id: SubscriberId, subject_filter: SubjectFilter, queue_tx: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            subscriber_id,
            subject_filter,
            queue_tx,
            last_ping_at: Utc::now(),
        }
    }
}
