//! In-process event bus built on tokio broadcast channels
//!
//! Used when no broker is configured and by tests that want to observe
//! announcements the way a downstream subscriber would.

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::events::publisher::EventPublisher;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

pub struct LocalEventBus {
    channels: Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>,
    capacity: usize,
}

impl LocalEventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to a channel; only payloads published after this call are seen
    pub fn subscribe(&self, channel: &str) -> CoordinatorResult<broadcast::Receiver<Vec<u8>>> {
        let sender = self.sender(channel)?;
        Ok(sender.subscribe())
    }

    /// Current number of live subscribers on a channel
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .ok()
            .and_then(|channels| channels.get(channel).map(|s| s.receiver_count()))
            .unwrap_or(0)
    }

    fn sender(&self, channel: &str) -> CoordinatorResult<broadcast::Sender<Vec<u8>>> {
        let mut channels = self
            .channels
            .lock()
            .map_err(|_| CoordinatorError::InternalError {
                message: "Failed to acquire event bus lock".to_string(),
            })?;

        let sender = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Ok(sender.clone())
    }
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl EventPublisher for LocalEventBus {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> CoordinatorResult<()> {
        let sender = self.sender(channel)?;
        match sender.send(payload) {
            Ok(receivers) => debug!("Delivered event on '{}' to {} subscribers", channel, receivers),
            // Pub/sub semantics: nobody listening is not a failure
            Err(_) => debug!("No subscribers on '{}', event dropped", channel),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_payloads() {
        let bus = LocalEventBus::new(16);
        let mut first = bus.subscribe("game_servers").unwrap();
        let mut second = bus.subscribe("game_servers").unwrap();
        assert_eq!(bus.subscriber_count("game_servers"), 2);

        bus.publish("game_servers", b"hello".to_vec()).await.unwrap();

        assert_eq!(first.recv().await.unwrap(), b"hello".to_vec());
        assert_eq!(second.recv().await.unwrap(), b"hello".to_vec());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let bus = LocalEventBus::default();
        assert!(bus.publish("game_servers", b"dropped".to_vec()).await.is_ok());
        assert_eq!(bus.subscriber_count("game_servers"), 0);
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let bus = LocalEventBus::default();
        let mut servers = bus.subscribe("game_servers").unwrap();
        let _other = bus.subscribe("other").unwrap();

        bus.publish("other", b"x".to_vec()).await.unwrap();
        bus.publish("game_servers", b"y".to_vec()).await.unwrap();

        assert_eq!(servers.recv().await.unwrap(), b"y".to_vec());
    }
}
