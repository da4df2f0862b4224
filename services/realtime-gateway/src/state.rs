use std::sync::Arc;

use bus_adapter::KafkaBusProducer;
use realtime_hub::HubHandle;

/// Shared `actix_web::Data` injected into every handler (composition-root
/// pattern, matching `order_service::state::AppState`).
pub struct AppState {
    pub hub: HubHandle,
    /// Used by the chat intake path (`POST /api/v1/messages/`), which
    /// publishes directly to the bus — this binary owns no outbox, so there
    /// is no domain transaction to co-commit an event with.
    pub bus_producer: Arc<KafkaBusProducer>,
}
