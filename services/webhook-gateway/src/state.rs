use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::Notify;
use transactional_outbox::SqlxOutboxStore;
use webhook_ingestor::{DeadLetterStore, WebhookIdempotencyStore};

use crate::config::WebhookConfig;

/// Shared `actix_web::Data` injected into every handler (composition-root
/// pattern, matching `order-service::state::AppState`).
pub struct AppState {
    pub db_pool: PgPool,
    pub outbox: Arc<SqlxOutboxStore>,
    pub idempotency: WebhookIdempotencyStore,
    pub dead_letter: DeadLetterStore,
    /// Signalled after every successful outbox append so the worker doesn't
    /// wait out its full `poll_interval`.
    pub outbox_wake: Arc<Notify>,
    pub webhook_secrets: WebhookConfig,
}
