//! Dead-letter record for stage 3-5 failures.
//!
//! Stages 1-2 (parse & verify, accept-immediately) are synchronous and a
//! failure there is returned straight to the caller as 400/401 — nothing is
//! persisted. Stages 3-5 (dedupe, normalize, inject) run in a background
//! task; a persistent failure there is written here, keyed by
//! `idempotency_key`, so an operator can inspect and replay it without the
//! upstream sender retrying again.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::WebhookResult;

#[derive(Debug, Clone)]
pub struct DeadLetterRecord {
    pub id: Uuid,
    pub source: String,
    pub idempotency_key: String,
    pub raw_body: Value,
    pub failure_reason: String,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

/// Retention floor from the data model; the admin CLI (`webhook-admin`)
/// lists and replays rows older callers haven't purged yet.
pub const MIN_RETENTION_DAYS: i64 = 7;

#[derive(Clone)]
pub struct DeadLetterStore {
    pool: PgPool,
}

impl DeadLetterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        source: &str,
        idempotency_key: &str,
        raw_body: &Value,
        failure_reason: &str,
    ) -> WebhookResult<()> {
        sqlx::query(
            r#"
            INSERT INTO webhook_dead_letters (id, source, idempotency_key, raw_body, failure_reason, attempts, created_at)
            VALUES ($1, $2, $3, $4, $5, 1, NOW())
            ON CONFLICT (source, idempotency_key) DO UPDATE
            SET attempts = webhook_dead_letters.attempts + 1,
                failure_reason = EXCLUDED.failure_reason
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(source)
        .bind(idempotency_key)
        .bind(raw_body)
        .bind(failure_reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_since(&self, since: DateTime<Utc>) -> WebhookResult<Vec<DeadLetterRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, source, idempotency_key, raw_body, failure_reason, attempts, created_at
            FROM webhook_dead_letters
            WHERE created_at >= $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(DeadLetterRecord {
                    id: row.try_get("id")?,
                    source: row.try_get("source")?,
                    idempotency_key: row.try_get("idempotency_key")?,
                    raw_body: row.try_get("raw_body")?,
                    failure_reason: row.try_get("failure_reason")?,
                    attempts: row.try_get("attempts")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    /// Removes a row once an operator has confirmed a replay succeeded.
    pub async fn delete(&self, id: Uuid) -> WebhookResult<()> {
        sqlx::query("DELETE FROM webhook_dead_letters WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn purge_before(&self, before: DateTime<Utc>) -> WebhookResult<u64> {
        let result = sqlx::query("DELETE FROM webhook_dead_letters WHERE created_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
