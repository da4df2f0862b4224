use std::sync::Arc;

use bus_adapter::KafkaBusProducer;
use order_domain::SqlxOrderRepository;
use tokio::sync::Notify;
use transactional_outbox::SqlxOutboxStore;

/// Shared `actix_web::Data` injected into every handler (composition-root
/// pattern per the design notes — no ambient singletons).
pub struct AppState {
    pub repository: SqlxOrderRepository<SqlxOutboxStore>,
    /// Signalled after every successful `save` so the outbox worker doesn't
    /// wait out its full `poll_interval` before picking up a fresh event.
    pub outbox_wake: Arc<Notify>,
}

pub type BusProducerHandle = Arc<KafkaBusProducer>;
