//! Grab / LineMan delivery-status webhook normalization.
//!
//! Both providers post a delivery-status callback for an order; this
//! backbone carries it as an `ExternalReceiptObserved`-style observation
//! routed by `DomainEvent::subject` to
//! `delivery-updates` rather than `loyverse-webhooks` since `source` is not
//! `"loyverse"`.

use event_schema::domain::{DomainEvent, ExternalReceiptObserved};
use serde::Deserialize;

use crate::error::{WebhookError, WebhookResult};
use crate::sources::NormalizedWebhook;

#[derive(Debug, Deserialize)]
struct DeliveryWebhookBody {
    order_id: String,
    status: String,
}

pub fn normalize(provider: &'static str, body: &[u8]) -> WebhookResult<NormalizedWebhook> {
    let raw: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| WebhookError::MalformedBody(e.to_string()))?;
    let parsed: DeliveryWebhookBody =
        serde_json::from_value(raw.clone()).map_err(|e| WebhookError::MalformedBody(e.to_string()))?;

    let external_id = format!("{provider}:{}:{}", parsed.order_id, parsed.status);
    let event = DomainEvent::ExternalReceiptObserved(ExternalReceiptObserved {
        source: provider.to_string(),
        external_id: external_id.clone(),
        raw,
    });

    Ok(NormalizedWebhook {
        event,
        aggregate_id: parsed.order_id,
        aggregate_type: "delivery",
        upstream_event_id: Some(external_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_a_grab_delivery_update() {
        let body = br#"{"order_id": "order-1", "status": "picked_up"}"#;
        let normalized = normalize("grab", body).unwrap();
        assert_eq!(normalized.aggregate_id, "order-1");
        assert_eq!(normalized.event.subject(), "delivery-updates");
    }
}
