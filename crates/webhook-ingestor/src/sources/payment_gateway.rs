//! Payment gateway webhook normalization (Omise, 2c2p).
//!
//! Both gateways are treated identically once verified: a success callback
//! becomes a [`PaymentCompleted`]. Everything
//! else (pending, failed, refund callbacks) is out of scope for this
//! backbone and normalizes to nothing.

use event_schema::domain::{DomainEvent, PaymentCompleted};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::{WebhookError, WebhookResult};
use crate::sources::NormalizedWebhook;

#[derive(Debug, Deserialize)]
struct GatewayWebhookBody {
    status: String,
    transaction_id: String,
    amount: String,
    currency: String,
}

pub fn normalize(gateway: &'static str, body: &[u8]) -> WebhookResult<Option<NormalizedWebhook>> {
    let parsed: GatewayWebhookBody =
        serde_json::from_slice(body).map_err(|e| WebhookError::MalformedBody(e.to_string()))?;

    if parsed.status != "success" && parsed.status != "successful" {
        return Ok(None);
    }

    let amount = Decimal::from_str(&parsed.amount)
        .map_err(|_| WebhookError::UnrecognizedPayload(gateway))?;

    let event = DomainEvent::PaymentCompleted(PaymentCompleted {
        external_transaction_id: parsed.transaction_id.clone(),
        amount,
        currency: parsed.currency,
    });

    Ok(Some(NormalizedWebhook {
        event,
        aggregate_id: parsed.transaction_id.clone(),
        aggregate_type: "payment",
        upstream_event_id: Some(parsed.transaction_id),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_a_success_callback_into_payment_completed() {
        let body = br#"{"status": "success", "transaction_id": "tx-1", "amount": "150.00", "currency": "THB"}"#;
        let normalized = normalize("omise", body).unwrap().unwrap();
        match normalized.event {
            DomainEvent::PaymentCompleted(payment) => {
                assert_eq!(payment.external_transaction_id, "tx-1");
                assert_eq!(payment.amount, Decimal::new(15000, 2));
                assert_eq!(payment.currency, "THB");
            }
            _ => panic!("expected PaymentCompleted"),
        }
    }

    #[test]
    fn ignores_non_success_callbacks() {
        let body = br#"{"status": "pending", "transaction_id": "tx-1", "amount": "150.00", "currency": "THB"}"#;
        assert!(normalize("2c2p", body).unwrap().is_none());
    }
}
