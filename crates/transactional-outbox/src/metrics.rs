//! Prometheus metrics for the outbox store and worker.

use prometheus::{IntCounter, IntGauge, Registry};

#[derive(Clone)]
pub struct OutboxMetrics {
    pub pending: IntGauge,
    pub oldest_pending_age_seconds: IntGauge,
    pub published: IntCounter,
    pub failed: IntCounter,
    pub abandoned: IntCounter,
}

impl OutboxMetrics {
    pub fn new(registry: &Registry) -> Self {
        let pending = IntGauge::new("outbox_pending_events", "Events currently pending or in flight")
            .expect("metric names are valid");
        let oldest_pending_age_seconds = IntGauge::new(
            "outbox_oldest_pending_age_seconds",
            "Age in seconds of the oldest pending event",
        )
        .expect("metric names are valid");
        let published = IntCounter::new("outbox_published_total", "Events successfully published")
            .expect("metric names are valid");
        let failed = IntCounter::new("outbox_failed_total", "Publish attempts that failed")
            .expect("metric names are valid");
        let abandoned = IntCounter::new(
            "outbox_abandoned_total",
            "Events cancelled after exhausting their retry budget",
        )
        .expect("metric names are valid");

        registry.register(Box::new(pending.clone())).ok();
        registry.register(Box::new(oldest_pending_age_seconds.clone())).ok();
        registry.register(Box::new(published.clone())).ok();
        registry.register(Box::new(failed.clone())).ok();
        registry.register(Box::new(abandoned.clone())).ok();

        Self {
            pending,
            oldest_pending_age_seconds,
            published,
            failed,
            abandoned,
        }
    }
}
