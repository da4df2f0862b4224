//! Persistence for the order aggregate. [`OrderRepository::save`] is the one
//! place atomicity between the domain write and the outbox append is
//! enforced in this crate: the row upsert and the outbox append happen
//! inside the same `sqlx::Transaction`, so a crash between them is
//! impossible by construction — either both land or neither does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_schema::DomainEvent;
use sqlx::{PgPool, Postgres, Row, Transaction};
use transactional_outbox::OutboxStore;
use uuid::Uuid;

use crate::aggregate::{Order, OrderItem, OrderStatus, PaidStatus};
use crate::error::OrderResult;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> OrderResult<Option<Order>>;

    /// Persists `order` and appends every event in `events` to the outbox,
    /// all inside one transaction. Caller is responsible for having already
    /// validated the mutation against the in-memory aggregate; this method
    /// does not re-run business rules.
    async fn save(&self, order: &Order, events: &[DomainEvent]) -> OrderResult<()>;
}

pub struct SqlxOrderRepository<S: OutboxStore> {
    pool: PgPool,
    outbox: S,
}

impl<S: OutboxStore> SqlxOrderRepository<S> {
    pub fn new(pool: PgPool, outbox: S) -> Self {
        Self { pool, outbox }
    }
}

fn row_to_order(row: &sqlx::postgres::PgRow) -> OrderResult<Order> {
    use std::str::FromStr;

    let status_str: String = row.try_get("status")?;
    let paid_status_str: String = row.try_get("paid_status")?;
    let items_json: serde_json::Value = row.try_get("items")?;
    let items: Vec<OrderItem> = serde_json::from_value(items_json)?;

    Ok(Order {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        customer_id: row.try_get("customer_id")?,
        source: row.try_get("source")?,
        items,
        items_subtotal: row.try_get("items_subtotal")?,
        discount: row.try_get("discount")?,
        shipping_fee: row.try_get("shipping_fee")?,
        tax: row.try_get("tax")?,
        tax_enabled: row.try_get("tax_enabled")?,
        total: row.try_get("total")?,
        status: OrderStatus::from_str(&status_str)?,
        paid_status: PaidStatus::from_str(&paid_status_str)?,
        confirmed_at: row.try_get("confirmed_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
        cancelled_reason: row.try_get("cancelled_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl<S: OutboxStore> OrderRepository for SqlxOrderRepository<S> {
    async fn find_by_id(&self, id: Uuid) -> OrderResult<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, code, customer_id, source, items,
                   items_subtotal, discount, shipping_fee, tax, tax_enabled, total,
                   status, paid_status, confirmed_at, cancelled_at, cancelled_reason,
                   created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn save(&self, order: &Order, events: &[DomainEvent]) -> OrderResult<()> {
        let mut tx: Transaction<'_, Postgres> = self.pool.begin().await?;

        let items_json = serde_json::to_value(&order.items)?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, code, customer_id, source, items,
                items_subtotal, discount, shipping_fee, tax, tax_enabled, total,
                status, paid_status, confirmed_at, cancelled_at, cancelled_reason,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16,
                $17, $18
            )
            ON CONFLICT (id) DO UPDATE SET
                code = EXCLUDED.code,
                customer_id = EXCLUDED.customer_id,
                items = EXCLUDED.items,
                items_subtotal = EXCLUDED.items_subtotal,
                discount = EXCLUDED.discount,
                shipping_fee = EXCLUDED.shipping_fee,
                tax = EXCLUDED.tax,
                tax_enabled = EXCLUDED.tax_enabled,
                total = EXCLUDED.total,
                status = EXCLUDED.status,
                paid_status = EXCLUDED.paid_status,
                confirmed_at = EXCLUDED.confirmed_at,
                cancelled_at = EXCLUDED.cancelled_at,
                cancelled_reason = EXCLUDED.cancelled_reason,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(order.id)
        .bind(&order.code)
        .bind(&order.customer_id)
        .bind(&order.source)
        .bind(items_json)
        .bind(order.items_subtotal)
        .bind(order.discount)
        .bind(order.shipping_fee)
        .bind(order.tax)
        .bind(order.tax_enabled)
        .bind(order.total)
        .bind(order.status.as_str())
        .bind(order.paid_status.as_str())
        .bind(order.confirmed_at)
        .bind(order.cancelled_at)
        .bind(order.cancelled_reason.clone())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for event in events {
            let envelope = event.clone().into_envelope(order.id.to_string(), "order");
            self.outbox.append(&mut tx, &envelope).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}
