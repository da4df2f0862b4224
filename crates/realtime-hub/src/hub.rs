//! The single-process realtime fan-out hub.
//!
//! One [`Hub`] runs per process as a single-threaded cooperative event loop
//! (`run`): it owns the subscriber map outright and mutates it only from
//! that loop, so no locking is needed around the map itself. Every external
//! interaction — register, unregister, broadcast — goes through
//! [`HubHandle`], a cheap `Clone` wrapper around an `mpsc::Sender`, matching
//! the "inject into handlers, no ambient singleton" design note.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{HubError, HubResult};
use crate::metrics::HubMetrics;
use crate::subscription::{OutboundMessage, SubjectFilter, Subscription, SubscriberId};

const DEFAULT_QUEUE_CAPACITY: usize = 256;
const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(15);
const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(90);

enum HubCommand {
    Register {
        subject_filter: SubjectFilter,
        queue_tx: mpsc::Sender<OutboundMessage>,
        reply: oneshot::Sender<SubscriberId>,
    },
    Unregister {
        subscriber_id: SubscriberId,
    },
    Broadcast {
        subject: String,
        message: OutboundMessage,
    },
    Touch {
        subscriber_id: SubscriberId,
    },
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of each subscriber's outbound queue.
    pub queue_capacity: usize,
    /// How often the loop scans for subscribers that haven't pinged.
    pub reap_interval: Duration,
    /// A subscriber with no `touch` in this long is unregistered, same as
    /// an explicit read timeout.
    pub stale_after: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            reap_interval: DEFAULT_REAP_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

/// Cheaply cloneable front door to a running [`Hub`]. Handlers hold one of
/// these; only `Hub::run` holds the receiving end of its command channel.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
    queue_capacity: usize,
}

impl HubHandle {
    /// Registers a new subscriber and returns its id plus the receiving end
    /// of its bounded outbound queue. The caller (a WebSocket actor) reads
    /// from the queue and forwards frames to the client.
    pub async fn register(&self, subject_filter: SubjectFilter) -> HubResult<(SubscriberId, mpsc::Receiver<OutboundMessage>)> {
        let (queue_tx, queue_rx) = mpsc::channel(self.queue_capacity);
        let (reply_tx, reply_rx) = oneshot::channel();

        self.commands
            .send(HubCommand::Register {
                subject_filter,
                queue_tx,
                reply: reply_tx,
            })
            .await
            .map_err(|_| HubError::HubClosed)?;

        let subscriber_id = reply_rx.await.map_err(|_| HubError::HubClosed)?;
        Ok((subscriber_id, queue_rx))
    }

    pub async fn unregister(&self, subscriber_id: SubscriberId) -> HubResult<()> {
        self.commands
            .send(HubCommand::Unregister { subscriber_id })
            .await
            .map_err(|_| HubError::HubClosed)
    }

    /// Enqueues `message` to every subscription whose filter admits
    /// `subject`. Never blocks on a slow consumer — a full queue gets
    /// that subscriber disconnected inside the loop, not here.
    pub async fn broadcast(&self, subject: impl Into<String>, message: OutboundMessage) -> HubResult<()> {
        self.commands
            .send(HubCommand::Broadcast {
                subject: subject.into(),
                message,
            })
            .await
            .map_err(|_| HubError::HubClosed)
    }

    /// Records a liveness signal (pong frame, or any inbound frame) for a
    /// subscriber so the reaper doesn't disconnect it as stale.
    pub async fn touch(&self, subscriber_id: SubscriberId) -> HubResult<()> {
        self.commands
            .send(HubCommand::Touch { subscriber_id })
            .await
            .map_err(|_| HubError::HubClosed)
    }
}

pub struct Hub {
    config: HubConfig,
    commands_tx: mpsc::Sender<HubCommand>,
    commands_rx: mpsc::Receiver<HubCommand>,
    metrics: Option<HubMetrics>,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(1024);
        Self {
            config,
            commands_tx,
            commands_rx,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: HubMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn handle(&self) -> HubHandle {
        HubHandle {
            commands: self.commands_tx.clone(),
            queue_capacity: self.config.queue_capacity,
        }
    }

    /// The event loop. Runs until `shutdown` fires, at which point every
    /// subscriber's queue is dropped (closing it) and the loop returns.
    pub async fn run(mut self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        let mut subscriptions: HashMap<SubscriberId, Subscription> = HashMap::new();
        let mut reap_tick = tokio::time::interval(self.config.reap_interval);

        info!(queue_capacity = self.config.queue_capacity, "realtime hub starting");

        loop {
            tokio::select! {
                cmd = self.commands_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd, &mut subscriptions),
                        None => {
                            warn!("all hub handles dropped, stopping");
                            return;
                        }
                    }
                }
                _ = reap_tick.tick() => {
                    self.reap_stale(&mut subscriptions);
                }
                _ = shutdown.recv() => {
                    info!(subscribers = subscriptions.len(), "hub shutting down, closing all subscriber queues");
                    subscriptions.clear();
                    return;
                }
            }

            if let Some(metrics) = &self.metrics {
                metrics.subscribers.set(subscriptions.len() as i64);
            }
        }
    }

    fn handle_command(&self, cmd: HubCommand, subscriptions: &mut HashMap<SubscriberId, Subscription>) {
        match cmd {
            HubCommand::Register { subject_filter, queue_tx, reply } => {
                let subscriber_id = Uuid::new_v4();
                subscriptions.insert(subscriber_id, Subscription::new(subscriber_id, subject_filter, queue_tx));
                debug!(%subscriber_id, "subscriber registered");
                let _ = reply.send(subscriber_id);
            }
            HubCommand::Unregister { subscriber_id } => {
                if subscriptions.remove(&subscriber_id).is_some() {
                    debug!(%subscriber_id, "subscriber unregistered");
                }
            }
            HubCommand::Touch { subscriber_id } => {
                if let Some(sub) = subscriptions.get_mut(&subscriber_id) {
                    sub.last_ping_at = Utc::now();
                }
            }
            HubCommand::Broadcast { subject, message } => {
                self.broadcast_to(subscriptions, &subject, message);
            }
        }
    }

    /// Enqueues to every admitting subscriber via `try_send`. A subscriber
    /// whose queue is full (slow consumer) or whose receiver is gone
    /// (client already disconnected) is dropped from the map right here —
    /// this is the only place "never stall a broadcast on one slow
    /// client" is enforced.
    fn broadcast_to(&self, subscriptions: &mut HashMap<SubscriberId, Subscription>, subject: &str, message: OutboundMessage) {
        let mut slow = Vec::new();

        for (id, sub) in subscriptions.iter() {
            if !sub.subject_filter.admits(subject) {
                continue;
            }
            match sub.queue_tx.try_send(message.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber_id = %id, %subject, "subscriber queue full, disconnecting slow consumer");
                    slow.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    slow.push(*id);
                }
            }
        }

        for id in slow {
            subscriptions.remove(&id);
            if let Some(metrics) = &self.metrics {
                metrics.slow_consumers_disconnected.inc();
            }
        }
    }

    fn reap_stale(&self, subscriptions: &mut HashMap<SubscriberId, Subscription>) {
        let cutoff = Utc::now() - chrono::Duration::from_std(self.config.stale_after).unwrap_or_default();
        let stale: Vec<SubscriberId> = subscriptions
            .iter()
            .filter(|(_, sub)| sub.last_ping_at < cutoff)
            .map(|(id, _)| *id)
            .collect();

        for id in &stale {
            warn!(subscriber_id = %id, "read timeout, unregistering stale subscriber");
            subscriptions.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn spawn_hub(config: HubConfig) -> (HubHandle, tokio::sync::broadcast::Sender<()>, tokio::task::JoinHandle<()>) {
        let hub = Hub::new(config);
        let handle = hub.handle();
        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        let join = tokio::spawn(hub.run(shutdown_rx));
        (handle, shutdown_tx, join)
    }

    #[tokio::test]
    #[serial]
    async fn broadcast_reaches_matching_subscribers_only() {
        let (handle, shutdown_tx, join) = spawn_hub(HubConfig::default());

        let (id_a, mut rx_a) = handle.register(SubjectFilter::Conversation("conv-1".to_string())).await.unwrap();
        let (_id_b, mut rx_b) = handle.register(SubjectFilter::Conversation("conv-2".to_string())).await.unwrap();

        handle
            .broadcast(
                "conversation:conv-1",
                OutboundMessage { subject: "conversation:conv-1".to_string(), payload: serde_json::json!({"text": "hi"}) },
            )
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), rx_a.recv()).await.unwrap().unwrap();
        assert_eq!(received.subject, "conversation:conv-1");

        // conv-2 subscriber must not have received anything.
        let nothing = tokio::time::timeout(Duration::from_millis(100), rx_b.recv()).await;
        assert!(nothing.is_err());

        handle.unregister(id_a).await.unwrap();
        let _ = shutdown_tx.send(());
        join.await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn slow_consumer_is_disconnected_without_blocking_others() {
        let config = HubConfig { queue_capacity: 4, ..HubConfig::default() };
        let (handle, shutdown_tx, join) = spawn_hub(config);

        let (_fast_id, mut fast_rx) = handle.register(SubjectFilter::Conversation("c".to_string())).await.unwrap();
        let (_slow_id, _slow_rx) = handle.register(SubjectFilter::Conversation("c".to_string())).await.unwrap();
        // _slow_rx is never read from, so its queue will fill.

        for i in 0..20 {
            handle
                .broadcast(
                    "conversation:c",
                    OutboundMessage { subject: "conversation:c".to_string(), payload: serde_json::json!({"n": i}) },
                )
                .await
                .unwrap();
        }

        // Fast consumer must still have received messages promptly; it was
        // never blocked by the slow one's full queue.
        let first = tokio::time::timeout(Duration::from_secs(1), fast_rx.recv()).await.unwrap();
        assert!(first.is_some());

        let _ = shutdown_tx.send(());
        join.await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn unregister_closes_the_queue() {
        let (handle, shutdown_tx, join) = spawn_hub(HubConfig::default());

        let (id, mut rx) = handle.register(SubjectFilter::User("u1".to_string())).await.unwrap();
        handle.unregister(id).await.unwrap();

        // give the loop a tick to process the unregister
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.recv().await.is_none());

        let _ = shutdown_tx.send(());
        join.await.unwrap();
    }
}
