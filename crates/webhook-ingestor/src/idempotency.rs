//! Webhook Idempotency Marker.
//!
//! Distinct from `idempotent_consumer::IdempotencyGuard`: that crate guards
//! bus *consumers* against redelivery of an already-assigned `event_id`.
//! This one guards the *ingestion* boundary against an upstream webhook
//! sender retrying the same delivery — the key is `(source,
//! signature_or_event_id)`, computed before any `DomainEvent` exists.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::error::WebhookResult;

/// Marks a single accepted webhook delivery. Retained at least 24h per the
/// data model; callers typically run `purge_before` on a periodic job.
#[derive(Clone)]
pub struct WebhookIdempotencyStore {
    pool: PgPool,
}

impl WebhookIdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns `true` if this delivery was already marked accepted.
    pub async fn is_duplicate(&self, source: &str, idempotency_key: &str) -> WebhookResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM webhook_idempotency_markers
                WHERE source = $1 AND idempotency_key = $2
            ) AS exists
            "#,
        )
        .bind(source)
        .bind(idempotency_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("exists")?)
    }

    /// Records acceptance. Uses `ON CONFLICT DO NOTHING` so two concurrent
    /// deliveries of the same retry race harmlessly — whichever wins the
    /// insert is the one that proceeds.
    ///
    /// Returns `true` if this call actually inserted the marker (first time
    /// seen), `false` if a concurrent or prior call already had.
    pub async fn mark_accepted(&self, source: &str, idempotency_key: &str) -> WebhookResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_idempotency_markers (source, idempotency_key, accepted_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (source, idempotency_key) DO NOTHING
            "#,
        )
        .bind(source)
        .bind(idempotency_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Same as [`Self::mark_accepted`], but inside the caller's transaction
    /// so the marker and whatever it gates (e.g. an outbox append) commit
    /// or roll back together. A delivery is only durably "accepted" once
    /// that transaction commits; a failed append rolls the marker back too,
    /// so a retry sees the delivery as not-yet-accepted instead of it being
    /// silently dropped.
    pub async fn mark_accepted_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        source: &str,
        idempotency_key: &str,
    ) -> WebhookResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_idempotency_markers (source, idempotency_key, accepted_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (source, idempotency_key) DO NOTHING
            "#,
        )
        .bind(source)
        .bind(idempotency_key)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes markers accepted before `before`, for retention enforcement.
    pub async fn purge_before(&self, before: DateTime<Utc>) -> WebhookResult<u64> {
        let result = sqlx::query("DELETE FROM webhook_idempotency_markers WHERE accepted_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
