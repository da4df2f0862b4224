//! Prometheus metrics for the realtime hub.

use prometheus::{IntCounter, IntGauge, Registry};

#[derive(Clone)]
pub struct HubMetrics {
    pub subscribers: IntGauge,
    pub slow_consumers_disconnected: IntCounter,
}

impl HubMetrics {
    pub fn new(registry: &Registry) -> Self {
        let subscribers = IntGauge::new("hub_subscribers", "Currently registered WebSocket subscribers")
            .expect("metric names are valid");
        let slow_consumers_disconnected = IntCounter::new(
            "hub_slow_consumers_disconnected_total",
            "Subscribers disconnected because their outbound queue filled",
        )
        .expect("metric names are valid");

        registry.register(Box::new(subscribers.clone())).ok();
        registry.register(Box::new(slow_consumers_disconnected.clone())).ok();

        Self {
            subscribers,
            slow_consumers_disconnected,
        }
    }
}
