use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::{EventEnvelope, SchemaError};

/// One order line as it appears inside an event payload. This is a data
/// carrier only; the owning `order-domain` crate has its own richer
/// `OrderItem` type used for in-memory mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOrderItem {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub is_override: bool,
    pub override_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: String,
    pub code: String,
    pub customer_id: Option<String>,
    pub items: Vec<EventOrderItem>,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub order_id: String,
    pub confirmed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: String,
    pub reason: String,
    pub cancelled_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockOverrideApplied {
    pub order_id: String,
    pub actor_id: String,
    pub items: Vec<EventOrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCompleted {
    pub external_transaction_id: String,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageReceived {
    pub platform: String,
    pub conversation_id: String,
    pub user_id: String,
    pub message: String,
    pub reply_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageSent {
    pub conversation_id: String,
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalReceiptObserved {
    pub source: String,
    pub external_id: String,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEventAbandoned {
    pub original_event_id: Uuid,
    pub aggregate_id: String,
    pub event_type: String,
    pub retry_count: i32,
    pub last_error: String,
}

/// Tagged union over every event family this backbone carries. The outbox
/// itself never deserializes into this type — it stores raw envelope
/// bytes — but any consumer that needs typed access decodes an envelope
/// into one of these via [`DomainEvent::from_envelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum DomainEvent {
    OrderCreated(OrderCreated),
    OrderConfirmed(OrderConfirmed),
    OrderCancelled(OrderCancelled),
    OrderStatusChanged(OrderStatusChanged),
    StockOverrideApplied(StockOverrideApplied),
    PaymentCompleted(PaymentCompleted),
    ChatMessageReceived(ChatMessageReceived),
    ChatMessageSent(ChatMessageSent),
    ExternalReceiptObserved(ExternalReceiptObserved),
    OutboxEventAbandoned(OutboxEventAbandoned),
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::OrderCreated(_) => "OrderCreated",
            DomainEvent::OrderConfirmed(_) => "OrderConfirmed",
            DomainEvent::OrderCancelled(_) => "OrderCancelled",
            DomainEvent::OrderStatusChanged(_) => "OrderStatusChanged",
            DomainEvent::StockOverrideApplied(_) => "StockOverrideApplied",
            DomainEvent::PaymentCompleted(_) => "PaymentCompleted",
            DomainEvent::ChatMessageReceived(_) => "ChatMessageReceived",
            DomainEvent::ChatMessageSent(_) => "ChatMessageSent",
            DomainEvent::ExternalReceiptObserved(_) => "ExternalReceiptObserved",
            DomainEvent::OutboxEventAbandoned(_) => "OutboxEventAbandoned",
        }
    }

    /// The bus subject family this event routes to.
    pub fn subject(&self) -> &'static str {
        match self {
            DomainEvent::OrderCreated(_)
            | DomainEvent::OrderConfirmed(_)
            | DomainEvent::OrderCancelled(_)
            | DomainEvent::OrderStatusChanged(_)
            | DomainEvent::StockOverrideApplied(_) => "order-events",
            DomainEvent::PaymentCompleted(_) => "payment-events",
            DomainEvent::ChatMessageReceived(_) | DomainEvent::ChatMessageSent(_) => {
                "chat-messages"
            }
            DomainEvent::ExternalReceiptObserved(ExternalReceiptObserved { source, .. })
                if source == "loyverse" =>
            {
                "loyverse-webhooks"
            }
            DomainEvent::ExternalReceiptObserved(_) => "delivery-updates",
            DomainEvent::OutboxEventAbandoned(_) => "order-events",
        }
    }

    /// Serializes the inner payload only (without the `event_type` tag),
    /// for embedding inside an [`EventEnvelope::payload`].
    pub fn to_payload(&self) -> serde_json::Value {
        let tagged = serde_json::to_value(self).expect("domain event always serializes");
        match tagged {
            serde_json::Value::Object(mut map) => {
                map.remove("event_type");
                serde_json::Value::Object(map)
            }
            other => other,
        }
    }

    pub fn into_envelope(self, aggregate_id: impl Into<String>, aggregate_type: impl Into<String>) -> EventEnvelope {
        let event_type = self.event_type().to_string();
        EventEnvelope::new(aggregate_id, aggregate_type, event_type, self.to_payload())
    }

    /// Reconstructs a typed [`DomainEvent`] from an envelope's `event_type`
    /// and `payload`, per the design note that payloads are a tagged union
    /// decoded at the boundary.
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self, SchemaError> {
        let mut tagged = envelope.payload.clone();
        if let serde_json::Value::Object(map) = &mut tagged {
            map.insert(
                "event_type".to_string(),
                serde_json::Value::String(envelope.event_type.clone()),
            );
        }
        serde_json::from_value(tagged)
            .map_err(|_| SchemaError::MissingField("payload did not match event_type"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_an_envelope() {
        let event = DomainEvent::OrderConfirmed(OrderConfirmed {
            order_id: "order-1".to_string(),
            confirmed_at: chrono::Utc::now(),
        });
        let envelope = event.clone().into_envelope("order-1", "order");
        assert_eq!(envelope.event_type, "OrderConfirmed");
        assert_eq!(envelope.aggregate_id, "order-1");

        let decoded = DomainEvent::from_envelope(&envelope).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn subject_routes_order_family_events_to_order_events_topic() {
        let event = DomainEvent::OrderCreated(OrderCreated {
            order_id: "order-1".to_string(),
            code: "ORD202601010001".to_string(),
            customer_id: None,
            items: vec![],
            total: Decimal::new(2000, 2),
        });
        assert_eq!(event.subject(), "order-events");
    }

    #[test]
    fn subject_routes_loyverse_receipts_to_loyverse_webhooks_topic() {
        let event = DomainEvent::ExternalReceiptObserved(ExternalReceiptObserved {
            source: "loyverse".to_string(),
            external_id: "r-1".to_string(),
            raw: serde_json::json!({}),
        });
        assert_eq!(event.subject(), "loyverse-webhooks");
    }

    #[test]
    fn mismatched_payload_and_event_type_is_a_schema_error() {
        let mut envelope = EventEnvelope::new(
            "order-1",
            "order",
            "OrderConfirmed",
            serde_json::json!({"totally": "wrong shape"}),
        );
        envelope.payload = serde_json::json!({"unexpected_field": true});
        assert!(DomainEvent::from_envelope(&envelope).is_err());
    }
}
