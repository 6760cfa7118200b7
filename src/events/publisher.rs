//! Event publishing for assignment announcements

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::events::messages::PAYLOAD_CONTENT_TYPE;
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Publish/subscribe bus consumed by the coordinator
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a payload on a named channel
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> CoordinatorResult<()>;

    /// Whether the underlying transport looks usable (for health checks)
    async fn is_healthy(&self) -> bool {
        true
    }
}

/// Configuration for event publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub publish_timeout_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 500,
            publish_timeout_ms: 1000,
        }
    }
}

/// AMQP-based publisher; each channel maps to a fanout exchange of the same name
pub struct AmqpEventPublisher {
    channel: Channel,
    config: PublisherConfig,
    declared_exchanges: Mutex<HashSet<String>>,
}

impl AmqpEventPublisher {
    pub fn new(channel: Channel, config: PublisherConfig) -> Self {
        Self {
            channel,
            config,
            declared_exchanges: Mutex::new(HashSet::new()),
        }
    }

    /// Declare the fanout exchange backing a channel, once per process
    async fn ensure_exchange(&self, exchange: &str) -> CoordinatorResult<()> {
        let mut declared = self.declared_exchanges.lock().await;
        if declared.contains(exchange) {
            return Ok(());
        }

        let args = ExchangeDeclareArguments::new(exchange, "fanout");
        self.channel
            .exchange_declare(args)
            .await
            .map_err(|e| CoordinatorError::PublishFailed {
                message: format!("Failed to declare exchange '{}': {}", exchange, e),
            })?;

        info!("Declared fanout exchange '{}'", exchange);
        declared.insert(exchange.to_string());
        Ok(())
    }

    /// Single publish attempt bounded by the publish timeout
    async fn try_publish(&self, exchange: &str, payload: &[u8]) -> CoordinatorResult<()> {
        self.ensure_exchange(exchange).await?;

        let message_id = uuid::Uuid::new_v4().to_string();
        let args = BasicPublishArguments::new(exchange, "");
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&message_id)
            .with_timestamp(chrono::Utc::now().timestamp() as u64)
            .with_content_type(PAYLOAD_CONTENT_TYPE);

        let publish = self
            .channel
            .basic_publish(properties, payload.to_vec(), args);

        match timeout(Duration::from_millis(self.config.publish_timeout_ms), publish).await {
            Ok(Ok(())) => {
                debug!("Published message {} to '{}'", message_id, exchange);
                Ok(())
            }
            Ok(Err(e)) => Err(CoordinatorError::PublishFailed {
                message: format!("Failed to publish message: {}", e),
            }),
            Err(_) => Err(CoordinatorError::PublishFailed {
                message: format!(
                    "Publish timed out after {}ms",
                    self.config.publish_timeout_ms
                ),
            }),
        }
    }
}

#[async_trait]
impl EventPublisher for AmqpEventPublisher {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> CoordinatorResult<()> {
        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(channel, &payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish to '{}' after {} retries: {}",
                            channel, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} to '{}' failed: {}. Retrying in {:?}",
                        retry_count, channel, e, delay
                    );

                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }

    async fn is_healthy(&self) -> bool {
        self.channel.is_open()
    }
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published: std::sync::Mutex<Vec<(String, Vec<u8>)>>,
    fail: std::sync::atomic::AtomicBool,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail (or succeed again)
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// All (channel, payload) pairs published so far
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of payloads published on a channel
    pub fn count_on_channel(&self, channel: &str) -> usize {
        self.published()
            .iter()
            .filter(|(published_on, _)| published_on == channel)
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.published.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> CoordinatorResult<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CoordinatorError::PublishFailed {
                message: "mock publisher set to fail".to_string(),
            });
        }
        if let Ok(mut events) = self.published.lock() {
            events.push((channel.to_string(), payload));
        }
        Ok(())
    }
}
