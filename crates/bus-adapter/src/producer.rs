use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::message::OwnedHeaders;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::{debug, warn};

use crate::error::{BusError, BusResult};
use crate::subjects::topic_for;

/// A single key/value header attached to a published message.
pub type Header = (String, String);

/// Publishes domain events onto the bus. Implementations must guarantee
/// that a publish which returns `Ok` has been durably accepted by the
/// broker (not merely buffered client-side).
#[async_trait]
pub trait BusProducer: Send + Sync {
    async fn publish(
        &self,
        subject: &str,
        key: &str,
        payload: &[u8],
        headers: &[Header],
    ) -> BusResult<()>;
}

/// Kafka-backed [`BusProducer`] configured for idempotent, all-acks
/// delivery so that outbox retries can never silently duplicate or drop a
/// message on the broker side.
pub struct KafkaBusProducer {
    producer: FutureProducer,
    topic_prefix: String,
    delivery_timeout: Duration,
}

impl KafkaBusProducer {
    pub fn new(brokers: &str, topic_prefix: impl Into<String>) -> BusResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("message.timeout.ms", "30000")
            .set("compression.type", "zstd")
            .create()
            .map_err(|e| BusError::Unreachable(e.to_string()))?;

        Ok(Self {
            producer,
            topic_prefix: topic_prefix.into(),
            delivery_timeout: Duration::from_secs(30),
        })
    }
}

#[async_trait]
impl BusProducer for KafkaBusProducer {
    async fn publish(
        &self,
        subject: &str,
        key: &str,
        payload: &[u8],
        headers: &[Header],
    ) -> BusResult<()> {
        let topic = topic_for(&self.topic_prefix, subject);

        let mut owned_headers = OwnedHeaders::new();
        for (name, value) in headers {
            owned_headers = owned_headers.insert(rdkafka::message::Header {
                key: name.as_str(),
                value: Some(value.as_str()),
            });
        }

        let record = FutureRecord::to(&topic)
            .key(key)
            .payload(payload)
            .headers(owned_headers);

        match self.producer.send(record, self.delivery_timeout).await {
            Ok((partition, offset)) => {
                debug!(%topic, key, partition, offset, "published event");
                Ok(())
            }
            Err((err, _msg)) => {
                warn!(%topic, key, error = %err, "publish failed");
                Err(BusError::PublishFailed(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_prefix_applies_to_logical_subjects() {
        assert_eq!(topic_for("orderflow", "order-events"), "orderflow.order-events");
    }
}
