//! Convenience macros for appending domain events to the outbox.

/// Append a [`event_schema::DomainEvent`] to the outbox within an active
/// transaction.
///
/// # Usage
///
/// ```rust,no_run
/// use transactional_outbox::{append_event, OutboxStore, SqlxOutboxStore};
/// use event_schema::DomainEvent;
/// use event_schema::domain::OrderConfirmed;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, store: SqlxOutboxStore) -> Result<(), Box<dyn std::error::Error>> {
/// let mut tx = pool.begin().await?;
///
/// let event = DomainEvent::OrderConfirmed(OrderConfirmed {
///     order_id: "order-1".to_string(),
///     confirmed_at: chrono::Utc::now(),
/// });
///
/// append_event!(&mut tx, &store, event, "order-1", "order")?;
///
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! append_event {
    ($tx:expr, $store:expr, $event:expr, $aggregate_id:expr, $aggregate_type:expr) => {{
        let envelope = $event.into_envelope($aggregate_id, $aggregate_type);
        $store.append($tx, &envelope).await
    }};
}

#[cfg(test)]
mod tests {
    // Macro tests are compile-time checks; if this file compiles the macro
    // expands to well-typed code.
}
