//! # Transactional Outbox
//!
//! Guarantees that a domain write and the events it produces commit
//! atomically. Business code inserts rows into its own tables and an
//! `outbox_events` row in the *same* transaction; a background worker then
//! drains that table onto the bus, retrying with backoff until the broker
//! durably acknowledges the record.
//!
//! ## Why
//!
//! Without this pattern a service either loses events (commit succeeds,
//! publish crashes) or risks the reverse (publish succeeds, commit rolls
//! back). Writing the event row inside the same transaction as the
//! business change removes that race; the worker's job becomes "deliver
//! every committed row eventually", which is a much easier problem.
//!
//! ## Ordering and leasing
//!
//! Events for one `aggregate_id` must reach the bus in the order they were
//! appended, so [`OutboxStore::claim_batch`] hands out at most one
//! `in_flight` event per aggregate at a time, and only the oldest
//! non-terminal row for that aggregate (`SELECT DISTINCT ON (aggregate_id)
//! ... FOR UPDATE SKIP LOCKED`). If that head row isn't itself claimable
//! yet — still in backoff, or its lease hasn't expired — the aggregate
//! yields nothing this cycle rather than handing out a younger sibling out
//! of order. Each claim carries a lease (`lease_holder`,
//! `lease_expires_at`); a worker that crashes mid-publish simply lets its
//! lease lapse and another worker reclaims the row.
//!
//! ## Retry and abandonment
//!
//! A failed publish returns the row to `pending` with an exponential
//! backoff (`next_attempt_at`). After `max_retries` attempts the row moves
//! to `cancelled` and the worker emits a single `OutboxEventAbandoned`
//! meta-event so operators are paged; abandonment never blocks later
//! events for the same aggregate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bus_adapter::BusProducer;
use chrono::{DateTime, Utc};
use event_schema::{DomainEvent, EventEnvelope};
use rand::Rng;
use resilience::circuit_breaker::CircuitBreaker;
use resilience::presets::kafka_config;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

mod error;
pub mod macros;
pub mod metrics;

pub use error::{OutboxError, OutboxResult};

/// Position of an outbox row in the delivery DAG:
/// `pending -> in_flight -> { sent | failed -> pending | cancelled }`.
/// `sent` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    InFlight,
    Sent,
    Failed,
    Cancelled,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::InFlight => "in_flight",
            OutboxStatus::Sent => "sent",
            OutboxStatus::Failed => "failed",
            OutboxStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for OutboxStatus {
    type Err = OutboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxStatus::Pending),
            "in_flight" => Ok(OutboxStatus::InFlight),
            "sent" => Ok(OutboxStatus::Sent),
            "failed" => Ok(OutboxStatus::Failed),
            "cancelled" => Ok(OutboxStatus::Cancelled),
            other => Err(OutboxError::Other(format!("unknown outbox status: {other}"))),
        }
    }
}

/// One row of the outbox table: an envelope plus delivery state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub event_id: Uuid,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub event_type: String,
    pub schema_version: i32,
    pub payload: serde_json::Value,
    pub headers: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,

    pub status: OutboxStatus,
    pub retry_count: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,

    pub lease_holder: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl OutboxRecord {
    /// Rebuilds the wire envelope from a stored row, ready to hand to the
    /// bus adapter unchanged.
    pub fn to_envelope(&self) -> OutboxResult<EventEnvelope> {
        let headers = serde_json::from_value(self.headers.clone())?;
        Ok(EventEnvelope {
            event_id: self.event_id,
            aggregate_id: self.aggregate_id.clone(),
            aggregate_type: self.aggregate_type.clone(),
            event_type: self.event_type.clone(),
            schema_version: self.schema_version as u32,
            occurred_at: self.occurred_at,
            payload: self.payload.clone(),
            headers,
            extra: Default::default(),
        })
    }
}

/// Storage contract for the outbox table. `SqlxOutboxStore` is the only
/// production implementation; the trait exists so workers can be tested
/// against an in-memory fake.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Appends one event inside the caller's transaction. Fails with
    /// `DuplicateEvent` if `event_id` is already present.
    async fn append(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        envelope: &EventEnvelope,
    ) -> OutboxResult<()>;

    /// Atomically moves up to `limit` claimable events to `in_flight`,
    /// owned by `worker_id` for `lease_ttl`, and returns them. At most one
    /// `in_flight` event per `aggregate_id` is ever handed out.
    async fn claim_batch(
        &self,
        worker_id: &str,
        limit: i64,
        lease_ttl: Duration,
    ) -> OutboxResult<Vec<OutboxRecord>>;

    /// Marks a leased event `sent`. Fails with `EventNotFound` if the
    /// caller no longer holds the lease (it expired and was reclaimed).
    async fn mark_sent(&self, event_id: Uuid, worker_id: &str) -> OutboxResult<()>;

    /// Records a failed publish attempt. Returns the row to `pending`
    /// with `next_attempt_at = now + backoff`, or to `cancelled` once
    /// `retry_count` reaches `max_retries`. Returns the resulting status
    /// so the caller can decide whether to emit `OutboxEventAbandoned`.
    async fn mark_failed(
        &self,
        event_id: Uuid,
        worker_id: &str,
        error: &str,
        backoff: Duration,
        max_retries: i32,
    ) -> OutboxResult<OutboxStatus>;

    /// Deletes terminal (`sent`, `cancelled`) rows older than `before`.
    async fn purge_sent(&self, before: DateTime<Utc>) -> OutboxResult<u64>;

    /// Count of non-terminal rows, and the age in seconds of the oldest
    /// one (0 if none pending).
    async fn pending_stats(&self) -> OutboxResult<(i64, i64)>;
}

/// Postgres-backed [`OutboxStore`].
pub struct SqlxOutboxStore {
    pool: PgPool,
}

impl SqlxOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resets terminal/cancelled rows in `[from_id, to_id]` back to
    /// `pending` for operator-driven replay. Used by the admin CLI.
    pub async fn replay_range(&self, from_id: Uuid, to_id: Uuid) -> OutboxResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = 'pending',
                retry_count = 0,
                next_attempt_at = NOW(),
                last_error = NULL,
                lease_holder = NULL,
                lease_expires_at = NULL
            WHERE event_id BETWEEN $1 AND $2
              AND status IN ('cancelled', 'failed')
            "#,
        )
        .bind(from_id)
        .bind(to_id)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }

    /// Resets every `cancelled` row back to `pending`, for when an
    /// operator has fixed whatever made a whole class of events
    /// unpublishable and wants them all retried, not just a known range.
    pub async fn requeue_cancelled(&self) -> OutboxResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = 'pending',
                retry_count = 0,
                next_attempt_at = NOW(),
                last_error = NULL
            WHERE status = 'cancelled'
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> OutboxResult<OutboxRecord> {
    let status_str: String = row.try_get("status")?;
    Ok(OutboxRecord {
        event_id: row.try_get("event_id")?,
        aggregate_id: row.try_get("aggregate_id")?,
        aggregate_type: row.try_get("aggregate_type")?,
        event_type: row.try_get("event_type")?,
        schema_version: row.try_get("schema_version")?,
        payload: row.try_get("payload")?,
        headers: row.try_get("headers")?,
        occurred_at: row.try_get("occurred_at")?,
        created_at: row.try_get("created_at")?,
        status: status_str.parse()?,
        retry_count: row.try_get("retry_count")?,
        next_attempt_at: row.try_get("next_attempt_at")?,
        last_error: row.try_get("last_error")?,
        lease_holder: row.try_get("lease_holder")?,
        lease_expires_at: row.try_get("lease_expires_at")?,
        sent_at: row.try_get("sent_at")?,
    })
}

#[async_trait]
impl OutboxStore for SqlxOutboxStore {
    async fn append(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        envelope: &EventEnvelope,
    ) -> OutboxResult<()> {
        let headers = serde_json::to_value(&envelope.headers)?;

        sqlx::query(
            r#"
            INSERT INTO outbox_events (
                event_id, aggregate_id, aggregate_type, event_type, schema_version,
                payload, headers, occurred_at, created_at,
                status, retry_count, next_attempt_at
            ) VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, NOW(),
                'pending', 0, NOW()
            )
            "#,
        )
        .bind(envelope.event_id)
        .bind(&envelope.aggregate_id)
        .bind(&envelope.aggregate_type)
        .bind(&envelope.event_type)
        .bind(envelope.schema_version as i32)
        .bind(&envelope.payload)
        .bind(headers)
        .bind(envelope.occurred_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| OutboxError::from_insert_error(e, envelope.event_id))?;

        debug!(
            event_id = %envelope.event_id,
            event_type = %envelope.event_type,
            aggregate_id = %envelope.aggregate_id,
            "event appended to outbox"
        );

        Ok(())
    }

    async fn claim_batch(
        &self,
        worker_id: &str,
        limit: i64,
        lease_ttl: Duration,
    ) -> OutboxResult<Vec<OutboxRecord>> {
        let lease_secs = lease_ttl.as_secs() as f64;

        // Per-aggregate FIFO means the oldest *non-terminal* row for an
        // aggregate is its head, and nothing behind it may be claimed
        // before it is — even if the head itself isn't claimable yet (it's
        // in backoff, or another worker still holds its lease). `heads`
        // picks that row per aggregate across both `pending` and
        // `in_flight`; `claimable` then keeps only the heads that are
        // actually ready right now. A head stuck in backoff simply
        // contributes nothing this cycle instead of letting a younger
        // sibling jump the queue.
        let rows = sqlx::query(
            r#"
            WITH heads AS (
                SELECT DISTINCT ON (aggregate_id) *
                FROM outbox_events
                WHERE status IN ('pending', 'in_flight')
                ORDER BY aggregate_id, created_at ASC
            ),
            claimable AS (
                SELECT event_id FROM heads
                WHERE (status = 'pending' AND next_attempt_at <= NOW())
                   OR (status = 'in_flight' AND lease_expires_at <= NOW())
            ),
            limited AS (
                SELECT event_id FROM claimable
                ORDER BY event_id
                LIMIT $1
            )
            UPDATE outbox_events o
            SET status = 'in_flight',
                lease_holder = $2,
                lease_expires_at = NOW() + make_interval(secs => $3)
            FROM limited
            WHERE o.event_id = limited.event_id
              AND o.event_id IN (
                  SELECT event_id FROM outbox_events
                  WHERE event_id = limited.event_id
                  FOR UPDATE SKIP LOCKED
              )
            RETURNING o.*
            "#,
        )
        .bind(limit)
        .bind(worker_id)
        .bind(lease_secs)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn mark_sent(&self, event_id: Uuid, worker_id: &str) -> OutboxResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = 'sent',
                sent_at = NOW(),
                lease_holder = NULL,
                lease_expires_at = NULL
            WHERE event_id = $1
              AND status = 'in_flight'
              AND lease_holder = $2
            "#,
        )
        .bind(event_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(%event_id, worker_id, "lease no longer held, cannot mark sent");
            return Err(OutboxError::EventNotFound(event_id));
        }

        debug!(%event_id, "event marked sent");
        Ok(())
    }

    async fn mark_failed(
        &self,
        event_id: Uuid,
        worker_id: &str,
        error: &str,
        backoff: Duration,
        max_retries: i32,
    ) -> OutboxResult<OutboxStatus> {
        let backoff_secs = backoff.as_secs() as f64;

        let row = sqlx::query(
            r#"
            UPDATE outbox_events
            SET retry_count = retry_count + 1,
                last_error = $3,
                lease_holder = NULL,
                lease_expires_at = NULL,
                status = CASE
                    WHEN retry_count + 1 >= $4 THEN 'cancelled'
                    ELSE 'pending'
                END,
                next_attempt_at = CASE
                    WHEN retry_count + 1 >= $4 THEN next_attempt_at
                    ELSE NOW() + make_interval(secs => $5)
                END
            WHERE event_id = $1
              AND status = 'in_flight'
              AND lease_holder = $2
            RETURNING status
            "#,
        )
        .bind(event_id)
        .bind(worker_id)
        .bind(error)
        .bind(max_retries)
        .bind(backoff_secs)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            warn!(%event_id, worker_id, "lease no longer held, cannot mark failed");
            return Err(OutboxError::EventNotFound(event_id));
        };

        let status_str: String = row.try_get("status")?;
        let status: OutboxStatus = status_str.parse()?;

        warn!(%event_id, error, status = status.as_str(), "event publish attempt failed");
        Ok(status)
    }

    async fn purge_sent(&self, before: DateTime<Utc>) -> OutboxResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM outbox_events
            WHERE status IN ('sent', 'cancelled')
              AND COALESCE(sent_at, created_at) < $1
            "#,
        )
        .bind(before)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn pending_stats(&self) -> OutboxResult<(i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*)::BIGINT AS pending,
                EXTRACT(EPOCH FROM (NOW() - MIN(created_at)))::BIGINT AS age_seconds
            FROM outbox_events
            WHERE status IN ('pending', 'in_flight', 'failed')
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let pending: i64 = row.try_get("pending").unwrap_or(0);
        let age: i64 = row.try_get::<Option<i64>, _>("age_seconds").ok().flatten().unwrap_or(0);
        Ok((pending, age))
    }
}

/// Exponential backoff with +/-30% jitter, capped at `max`.
///
/// Retry 0 -> ~1s, retry 1 -> ~2s, retry 2 -> ~4s, ... capped at `max`.
pub fn calculate_backoff(retry_count: i32, initial: Duration, max: Duration) -> Duration {
    let exp = 2u64.saturating_pow(retry_count.max(0) as u32);
    let base_secs = initial.as_secs().saturating_mul(exp).min(max.as_secs());

    let jitter_fraction = rand::thread_rng().gen_range(-0.3..0.3);
    let jittered = (base_secs as f64) * (1.0 + jitter_fraction);
    Duration::from_secs_f64(jittered.max(0.0))
}

/// Background worker that drains the outbox onto the bus.
///
/// Each worker instance claims a batch, publishes every event in the
/// batch (in the order returned, which respects per-aggregate FIFO), and
/// marks each `sent` or `failed` before claiming the next batch. Multiple
/// instances may run concurrently against the same store; leases keep
/// them from double-publishing the same aggregate's event.
pub struct OutboxWorker<S: OutboxStore, P: BusProducer> {
    worker_id: String,
    store: Arc<S>,
    producer: Arc<P>,
    batch_size: i64,
    lease_ttl: Duration,
    poll_interval: Duration,
    backoff_initial: Duration,
    backoff_max: Duration,
    max_retries: i32,
    metrics: Option<crate::metrics::OutboxMetrics>,
    wake_up: Arc<Notify>,
    shutdown: Arc<Notify>,
    circuit_breaker: CircuitBreaker,
}

/// Tunable knobs for an [`OutboxWorker`]; mirrors the `OUTBOX_*` environment
/// variables read by each service's `WorkerConfig`.
#[derive(Debug, Clone)]
pub struct OutboxWorkerConfig {
    pub batch_size: i64,
    pub lease_ttl: Duration,
    pub poll_interval: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    pub max_retries: i32,
}

impl Default for OutboxWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            lease_ttl: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(300),
            max_retries: 10,
        }
    }
}

impl<S: OutboxStore + 'static, P: BusProducer + 'static> OutboxWorker<S, P> {
    pub fn new(
        worker_id: impl Into<String>,
        store: Arc<S>,
        producer: Arc<P>,
        config: OutboxWorkerConfig,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            store,
            producer,
            batch_size: config.batch_size,
            lease_ttl: config.lease_ttl,
            poll_interval: config.poll_interval,
            backoff_initial: config.backoff_initial,
            backoff_max: config.backoff_max,
            max_retries: config.max_retries,
            metrics: None,
            wake_up: Arc::new(Notify::new()),
            shutdown: Arc::new(Notify::new()),
            circuit_breaker: CircuitBreaker::new(kafka_config().circuit_breaker),
        }
    }

    pub fn with_metrics(mut self, metrics: crate::metrics::OutboxMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Handle writers can hold to wake the worker immediately after
    /// committing a new event, instead of waiting out `poll_interval`.
    pub fn wake_handle(&self) -> Arc<Notify> {
        self.wake_up.clone()
    }

    /// Handle used to request a graceful stop; see [`Self::run`].
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Runs until `shutdown_handle().notify_one()` is called. Stops
    /// claiming new batches immediately, lets in-flight publishes finish
    /// naturally (they are already mid-call_batch loop), then returns.
    pub async fn run(&self) {
        info!(
            worker_id = %self.worker_id,
            batch_size = self.batch_size,
            "outbox worker starting"
        );

        loop {
            let published = match self.process_batch().await {
                Ok(n) => n,
                Err(e) => {
                    error!(worker_id = %self.worker_id, error = %e, "outbox worker batch error");
                    0
                }
            };

            if let Some(metrics) = &self.metrics {
                if let Ok((pending, age)) = self.store.pending_stats().await {
                    metrics.pending.set(pending);
                    metrics.oldest_pending_age_seconds.set(age);
                }
            }

            if published > 0 {
                // More work may already be waiting; loop again immediately.
                continue;
            }

            tokio::select! {
                _ = self.wake_up.notified() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.shutdown.notified() => {
                    info!(worker_id = %self.worker_id, "outbox worker shutting down");
                    return;
                }
            }
        }
    }

    async fn process_batch(&self) -> OutboxResult<i32> {
        let batch = self
            .store
            .claim_batch(&self.worker_id, self.batch_size, self.lease_ttl)
            .await?;

        let mut published = 0;

        for record in batch {
            let envelope = match record.to_envelope() {
                Ok(e) => e,
                Err(e) => {
                    error!(event_id = %record.event_id, error = %e, "failed to rebuild envelope, treating as publish failure");
                    self.handle_publish_failure(&record, &e.to_string()).await;
                    continue;
                }
            };

            let bytes = match envelope.encode() {
                Ok(b) => b,
                Err(e) => {
                    self.handle_publish_failure(&record, &e.to_string()).await;
                    continue;
                }
            };

            let headers: Vec<(String, String)> = envelope.bus_headers().into_iter().collect();
            let subject = DomainEvent::from_envelope(&envelope)
                .map(|e| e.subject().to_string())
                .unwrap_or_else(|_| record.aggregate_type.clone());

            let publish_result = self
                .circuit_breaker
                .call(|| self.producer.publish(&subject, &record.aggregate_id, &bytes, &headers))
                .await;

            match publish_result {
                Ok(()) => {
                    if let Err(e) = self.store.mark_sent(record.event_id, &self.worker_id).await {
                        error!(event_id = %record.event_id, error = %e, "publish succeeded but mark_sent failed");
                    } else {
                        published += 1;
                        if let Some(metrics) = &self.metrics {
                            metrics.published.inc();
                        }
                    }
                }
                Err(e) => {
                    self.handle_publish_failure(&record, &e.to_string()).await;
                }
            }
        }

        Ok(published)
    }

    async fn handle_publish_failure(&self, record: &OutboxRecord, error: &str) {
        let backoff = calculate_backoff(record.retry_count, self.backoff_initial, self.backoff_max);

        match self
            .store
            .mark_failed(record.event_id, &self.worker_id, error, backoff, self.max_retries)
            .await
        {
            Ok(OutboxStatus::Cancelled) => {
                if let Some(metrics) = &self.metrics {
                    metrics.abandoned.inc();
                }
                warn!(
                    event_id = %record.event_id,
                    aggregate_id = %record.aggregate_id,
                    retries = record.retry_count + 1,
                    "event abandoned after exhausting retry budget"
                );
                self.emit_abandonment(record, error).await;
            }
            Ok(_) => {
                if let Some(metrics) = &self.metrics {
                    metrics.failed.inc();
                }
            }
            Err(e) => {
                error!(event_id = %record.event_id, error = %e, "failed to record publish failure");
            }
        }
    }

    /// Publishes a best-effort `OutboxEventAbandoned` meta-event directly
    /// (bypassing the outbox, since the aggregate's outbox row is itself
    /// the thing that just gave up). Delivery of this alert is not
    /// guaranteed the way domain events are.
    async fn emit_abandonment(&self, record: &OutboxRecord, last_error: &str) {
        let meta = DomainEvent::OutboxEventAbandoned(event_schema::domain::OutboxEventAbandoned {
            original_event_id: record.event_id,
            aggregate_id: record.aggregate_id.clone(),
            event_type: record.event_type.clone(),
            retry_count: record.retry_count + 1,
            last_error: last_error.to_string(),
        });

        let envelope = meta.into_envelope(&record.aggregate_id, "outbox");
        let bytes = match envelope.encode() {
            Ok(b) => b,
            Err(e) => {
                error!(event_id = %record.event_id, error = %e, "failed to encode abandonment event");
                return;
            }
        };
        let headers: Vec<(String, String)> = envelope.bus_headers().into_iter().collect();

        if let Err(e) = self
            .producer
            .publish("outbox-alerts", &record.aggregate_id, &bytes, &headers)
            .await
        {
            error!(event_id = %record.event_id, error = %e, "failed to publish abandonment alert");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_string_form() {
        for status in [
            OutboxStatus::Pending,
            OutboxStatus::InFlight,
            OutboxStatus::Sent,
            OutboxStatus::Failed,
            OutboxStatus::Cancelled,
        ] {
            let parsed: OutboxStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn unknown_status_string_is_rejected() {
        assert!("unknown".parse::<OutboxStatus>().is_err());
    }

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let initial = Duration::from_secs(1);
        let max = Duration::from_secs(300);

        // jitter is +/-30%, so check the midpoint falls in a sane band
        for retry in 0..6 {
            let d = calculate_backoff(retry, initial, max);
            let expected = (2u64.pow(retry as u32)) as f64;
            let lower = expected * 0.6;
            let upper = (expected * 1.3).max(expected + 1.0);
            assert!(
                d.as_secs_f64() >= lower && d.as_secs_f64() <= upper.min(max.as_secs() as f64 * 1.3),
                "retry {retry}: {d:?} out of band around {expected}"
            );
        }

        let capped = calculate_backoff(20, initial, max);
        assert!(capped.as_secs_f64() <= max.as_secs() as f64 * 1.3);
    }
}
