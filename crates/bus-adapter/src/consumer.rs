use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{Headers, Message};
use rdkafka::TopicPartitionList;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::error::{BusError, BusResult};
use crate::subjects::topic_for;

/// Handles a single message pulled off the bus. Returning `Err` leaves the
/// message uncommitted so the consumer retries it; a handler that keeps
/// failing is eventually treated as poison (see `poison_threshold`).
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(
        &self,
        key: Option<&str>,
        payload: &[u8],
        headers: &[(String, String)],
    ) -> Result<(), BusError>;
}

/// Subscribes handlers to bus subjects and drives the consume loop.
#[async_trait]
pub trait BusConsumer: Send + Sync {
    async fn run(
        &self,
        subject: &str,
        group_id: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> BusResult<()>;
}

/// Kafka-backed [`BusConsumer`]. Offsets are committed manually, only after
/// the handler succeeds, so a crash mid-processing redelivers the message
/// rather than losing it (at-least-once delivery per I-spec).
pub struct KafkaBusConsumer {
    brokers: String,
    topic_prefix: String,
    poison_threshold: u32,
    retry_delay: Duration,
}

impl KafkaBusConsumer {
    pub fn new(brokers: impl Into<String>, topic_prefix: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            topic_prefix: topic_prefix.into(),
            poison_threshold: 5,
            retry_delay: Duration::from_millis(500),
        }
    }

    pub fn with_poison_threshold(mut self, threshold: u32) -> Self {
        self.poison_threshold = threshold;
        self
    }
}

#[async_trait]
impl BusConsumer for KafkaBusConsumer {
    async fn run(
        &self,
        subject: &str,
        group_id: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> BusResult<()> {
        let topic = topic_for(&self.topic_prefix, subject);

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| BusError::Unreachable(e.to_string()))?;

        consumer
            .subscribe(&[topic.as_str()])
            .map_err(|e| BusError::Unreachable(e.to_string()))?;

        // Tracks consecutive failed attempts per (partition, offset) so a
        // single unparseable message can't stall the partition forever.
        let attempts: Mutex<HashMap<(i32, i64), u32>> = Mutex::new(HashMap::new());

        loop {
            let msg = match consumer.recv().await {
                Ok(m) => m,
                Err(err) => {
                    warn!(%topic, error = %err, "consumer recv error, retrying");
                    sleep(self.retry_delay).await;
                    continue;
                }
            };

            let partition = msg.partition();
            let offset = msg.offset();
            let key = msg.key().and_then(|k| std::str::from_utf8(k).ok());
            let payload = msg.payload().unwrap_or_default();
            let headers: Vec<(String, String)> = msg
                .headers()
                .map(|hs| {
                    (0..hs.count())
                        .filter_map(|i| {
                            let h = hs.get(i);
                            let value = h.value.map(|v| String::from_utf8_lossy(v).into_owned())?;
                            Some((h.key.to_string(), value))
                        })
                        .collect()
                })
                .unwrap_or_default();

            match handler.handle(key, payload, &headers).await {
                Ok(()) => {
                    attempts.lock().await.remove(&(partition, offset));
                    if let Err(err) = consumer.commit_message(&msg, CommitMode::Async) {
                        warn!(%topic, partition, offset, error = %err, "commit failed");
                    }
                }
                Err(err) => {
                    let mut guard = attempts.lock().await;
                    let count = guard.entry((partition, offset)).or_insert(0);
                    *count += 1;

                    if *count >= self.poison_threshold {
                        error!(
                            %topic, partition, offset, attempts = *count, error = %err,
                            "poison message exceeded retry budget, skipping"
                        );
                        guard.remove(&(partition, offset));
                        drop(guard);
                        if let Err(commit_err) = consumer.commit_message(&msg, CommitMode::Async) {
                            warn!(%topic, partition, offset, error = %commit_err, "commit of skipped poison message failed");
                        }
                    } else {
                        let attempt = *count;
                        drop(guard);
                        warn!(%topic, partition, offset, attempt, error = %err, "handler failed, will retry");
                        sleep(self.retry_delay).await;

                        let mut tpl = TopicPartitionList::new();
                        tpl.add_partition_offset(&topic, partition, rdkafka::Offset::Offset(offset))
                            .ok();
                        if let Err(seek_err) = consumer.seek_partitions(tpl, Duration::from_secs(5)) {
                            warn!(%topic, partition, offset, error = %seek_err, "seek-back for retry failed");
                        }
                    }
                }
            }
        }
    }
}

#[allow(dead_code)]
fn _assert_handler_object_safe(_: &dyn MessageHandler) {}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysOk;

    #[async_trait]
    impl MessageHandler for AlwaysOk {
        async fn handle(
            &self,
            _key: Option<&str>,
            _payload: &[u8],
            _headers: &[(String, String)],
        ) -> Result<(), BusError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn handler_trait_is_object_safe_and_callable() {
        let handler: Arc<dyn MessageHandler> = Arc::new(AlwaysOk);
        assert!(handler.handle(None, b"{}", &[]).await.is_ok());
    }

    #[test]
    fn builder_sets_poison_threshold() {
        let consumer = KafkaBusConsumer::new("localhost:9092", "orderflow").with_poison_threshold(3);
        assert_eq!(consumer.poison_threshold, 3);
    }
}
