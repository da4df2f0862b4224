//! Bridges the bus consumer side of the fan-out hub: decodes every message pulled
//! from `chat-messages` back into a [`DomainEvent`] and re-broadcasts the
//! chat-relevant ones to local Hub subscribers. Everything else on the
//! subject is ignored rather than treated as an error, since the envelope
//! schema is shared with event families this binary has no reason to know
//! about.
//!
//! At-least-once delivery means the same `event_id` can arrive twice after a
//! rebalance or a producer retry; [`IdempotencyGuard`] makes the
//! re-broadcast a no-op the second time rather than relying on clients to
//! dedupe duplicate chat lines themselves.

use async_trait::async_trait;
use bus_adapter::{BusError, BusResult, MessageHandler};
use event_schema::domain::DomainEvent;
use event_schema::envelope::EventEnvelope;
use idempotent_consumer::IdempotencyGuard;
use realtime_hub::{HubHandle, OutboundMessage};

pub struct ChatBridgeHandler {
    hub: HubHandle,
    idempotency: IdempotencyGuard,
}

impl ChatBridgeHandler {
    pub fn new(hub: HubHandle, idempotency: IdempotencyGuard) -> Self {
        Self { hub, idempotency }
    }
}

#[async_trait]
impl MessageHandler for ChatBridgeHandler {
    async fn handle(&self, _key: Option<&str>, payload: &[u8], _headers: &[(String, String)]) -> BusResult<()> {
        let envelope = EventEnvelope::decode(payload).map_err(|e| BusError::HandlerFailed(e.to_string()))?;
        let event = DomainEvent::from_envelope(&envelope).map_err(|e| BusError::HandlerFailed(e.to_string()))?;

        let (conversation_id, body) = match &event {
            DomainEvent::ChatMessageReceived(chat) => (chat.conversation_id.clone(), serde_json::to_value(chat)),
            DomainEvent::ChatMessageSent(chat) => (chat.conversation_id.clone(), serde_json::to_value(chat)),
            _ => return Ok(()),
        };

        let payload = body.map_err(|e| BusError::HandlerFailed(e.to_string()))?;
        let subject = format!("conversation:{conversation_id}");
        let hub = self.hub.clone();
        let event_id = envelope.event_id.to_string();

        let result = self
            .idempotency
            .process_if_new(&event_id, || async move {
                hub.broadcast(subject.clone(), OutboundMessage { subject, payload })
                    .await
                    .map_err(|e| anyhow::anyhow!(e.to_string()))
            })
            .await
            .map_err(|e| BusError::HandlerFailed(e.to_string()))?;

        if let idempotent_consumer::ProcessingResult::Failed(reason) = result {
            return Err(BusError::HandlerFailed(reason));
        }

        Ok(())
    }
}
