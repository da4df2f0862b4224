//! Loyverse POS webhook normalization.
//!
//! A Loyverse `receipt_created` event becomes an
//! [`ExternalReceiptObserved`], with the whole receipt object carried in
//! `raw` untouched — this backbone has no independent opinion about
//! receipt line-item shape, it just observes that one occurred.

use event_schema::domain::{DomainEvent, ExternalReceiptObserved};
use serde::Deserialize;

use crate::error::{WebhookError, WebhookResult};
use crate::sources::NormalizedWebhook;

#[derive(Debug, Deserialize)]
struct LoyverseWebhookBody {
    #[serde(rename = "type")]
    event_type: String,
    receipt: LoyverseReceipt,
}

#[derive(Debug, Deserialize)]
struct LoyverseReceipt {
    receipt_number: String,
}

pub fn normalize(body: &[u8]) -> WebhookResult<Option<NormalizedWebhook>> {
    let raw: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| WebhookError::MalformedBody(e.to_string()))?;
    let parsed: LoyverseWebhookBody =
        serde_json::from_value(raw.clone()).map_err(|e| WebhookError::MalformedBody(e.to_string()))?;

    if parsed.event_type != "receipt_created" {
        return Ok(None);
    }

    let receipt_number = parsed.receipt.receipt_number;
    let event = DomainEvent::ExternalReceiptObserved(ExternalReceiptObserved {
        source: "loyverse".to_string(),
        external_id: receipt_number.clone(),
        raw,
    });

    Ok(Some(NormalizedWebhook {
        event,
        aggregate_id: receipt_number.clone(),
        aggregate_type: "webhook:loyverse",
        upstream_event_id: Some(receipt_number),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_a_receipt_created_event() {
        let body = br#"{"type": "receipt_created", "receipt": {"receipt_number": "R-1001"}}"#;
        let normalized = normalize(body).unwrap().unwrap();
        match normalized.event {
            DomainEvent::ExternalReceiptObserved(receipt) => {
                assert_eq!(receipt.source, "loyverse");
                assert_eq!(receipt.external_id, "R-1001");
            }
            _ => panic!("expected ExternalReceiptObserved"),
        }
        assert_eq!(normalized.aggregate_type, "webhook:loyverse");
    }

    #[test]
    fn ignores_non_receipt_created_events() {
        let body = br#"{"type": "receipt_updated", "receipt": {"receipt_number": "R-1001"}}"#;
        assert!(normalize(body).unwrap().is_none());
    }
}
