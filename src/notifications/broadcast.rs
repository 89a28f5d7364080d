use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;

use super::{MessageKind, Notification, Notifier, NotifyResult};
use crate::constants::BROADCAST_CAPACITY;

/// In-process notifier with one broadcast channel per topic.
///
/// Publishing to a topic nobody subscribed to is not an error.
#[derive(Debug)]
pub struct BroadcastNotifier {
    channels: DashMap<String, broadcast::Sender<Notification>>,
    capacity: usize,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Notification> {
        self.channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.channels
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drop channels whose subscribers have all gone away
    pub fn prune(&self) {
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(BROADCAST_CAPACITY)
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn publish(&self, topic: &str, kind: MessageKind, payload: Value) -> NotifyResult<()> {
        if let Some(sender) = self.channels.get(topic) {
            // A send error only means every receiver has been dropped
            let _ = sender.send(Notification::new(topic, kind, payload));
        }
        Ok(())
    }
}
