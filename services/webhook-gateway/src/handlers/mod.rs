//! HTTP handlers for the webhook ingestion pipeline.
//!
//! Every handler does exactly one synchronous thing: verify the signature
//! (stage 1). As soon as that passes it replies 2xx (stage 2) and hands the
//! raw body off to [`spawn_ingest`], which runs dedupe, normalize, and
//! inject (stages 3-5) in a background task. A downstream DB/outbox hiccup
//! therefore never turns a verified delivery into a 5xx for the upstream
//! sender — the aggressive retry behaviour stage 2 is designed around stays
//! harmless.

pub mod delivery;
pub mod facebook;
pub mod health;
pub mod line;
pub mod loyverse;
pub mod payment_gateway;

use std::time::Duration;

use actix_web::web;
use resilience::retry::{with_retry, RetryConfig};
use sha2::{Digest, Sha256};
use transactional_outbox::OutboxStore;
use webhook_ingestor::sources::NormalizedWebhook;
use webhook_ingestor::{WebhookError, WebhookResult};

use crate::error::AppError;
use crate::state::AppState;

/// Falls back to a body fingerprint for idempotency when a source's
/// `upstream_event_id` is absent, and as the dead-letter key for a body
/// that never made it past normalization.
fn fingerprint(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Bounded retry budget for stage 3-5 (dedupe + outbox append): a handful
/// of short-backoff attempts before the delivery is dead-lettered. Separate
/// from the outbox worker's own backoff, which governs publish-to-bus
/// retries once an event has already made it into the outbox.
fn ingest_retry_config() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_secs(2),
        backoff_multiplier: 2.0,
        jitter: true,
    }
}

/// Runs `normalize` and the rest of the ingestion pipeline off the request
/// path. Callers verify the signature, call this, and reply 2xx immediately
/// after — nothing here is awaited by the HTTP response, so a structural
/// parse error, a transient DB error, or an outbox append failure all land
/// in the dead-letter store instead of surfacing to the upstream sender.
pub fn spawn_ingest<F>(state: web::Data<AppState>, source: &'static str, raw_body: web::Bytes, normalize: F)
where
    F: FnOnce(&[u8]) -> WebhookResult<Option<NormalizedWebhook>> + Send + 'static,
{
    tokio::spawn(async move {
        let normalized = match normalize(&raw_body) {
            Ok(Some(n)) => n,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(source, error = %e, "webhook body failed to normalize, dead-lettering");
                dead_letter_raw(&state, source, &raw_body, &e.to_string()).await;
                return;
            }
        };

        let idempotency_key = normalized.upstream_event_id.clone().unwrap_or_else(|| fingerprint(&raw_body));
        let last_error = std::sync::Mutex::new(String::new());

        let outcome = with_retry(ingest_retry_config(), || {
            let state = state.clone();
            let idempotency_key = idempotency_key.clone();
            let normalized = normalized.clone();
            let last_error = &last_error;
            async move {
                accept_and_enqueue(&state, source, &idempotency_key, normalized)
                    .await
                    .map_err(|e| {
                        *last_error.lock().expect("not poisoned") = e.to_string();
                        e
                    })
            }
        })
        .await;

        if outcome.is_err() {
            let reason = last_error.into_inner().expect("not poisoned");
            tracing::error!(
                source,
                idempotency_key,
                reason,
                "webhook ingestion exhausted its retry budget, dead-lettering"
            );
            dead_letter_raw(&state, source, &raw_body, &reason).await;
        }
    });
}

/// Records a stage 3-5 failure (malformed body, or retry budget exhausted)
/// to the dead-letter store, keyed by a body fingerprint.
async fn dead_letter_raw(state: &AppState, source: &str, raw_body: &[u8], reason: &str) {
    let key = fingerprint(raw_body);
    let raw_value: serde_json::Value = serde_json::from_slice(raw_body).unwrap_or(serde_json::Value::Null);
    let _ = state.dead_letter.record(source, &key, &raw_value, reason).await;
}

/// Stages 3 and 5: deduplicate and append to the outbox. The idempotency
/// marker and the outbox row are written in the *same* transaction, so a
/// failed append rolls the marker back too — a retry (by this loop, or by
/// the next upstream redelivery) sees the delivery as not-yet-accepted
/// rather than silently losing it.
async fn accept_and_enqueue(
    state: &AppState,
    source: &str,
    idempotency_key: &str,
    normalized: NormalizedWebhook,
) -> Result<(), AppError> {
    let mut tx = state.db_pool.begin().await.map_err(WebhookError::Database)?;

    let accepted = state.idempotency.mark_accepted_tx(&mut tx, source, idempotency_key).await?;
    if !accepted {
        tracing::debug!(source, idempotency_key, "duplicate webhook delivery dropped");
        tx.rollback().await.map_err(WebhookError::Database)?;
        return Ok(());
    }

    let envelope = normalized.event.into_envelope(normalized.aggregate_id, normalized.aggregate_type);
    state.outbox.append(&mut tx, &envelope).await?;

    tx.commit().await.map_err(WebhookError::Database)?;
    state.outbox_wake.notify_one();

    Ok(())
}
