//! Assignment event publishing
//!
//! New assignments are announced on a named channel. The transport is either
//! an in-process broadcast bus or an AMQP broker with one fanout exchange per
//! channel.

pub mod connection;
pub mod local;
pub mod messages;
pub mod publisher;

// Re-export commonly used types
pub use connection::{AmqpConfig, AmqpConnection};
pub use local::LocalEventBus;
pub use messages::{MessageUtils, GAME_SERVERS_CHANNEL};
pub use publisher::{AmqpEventPublisher, EventPublisher, MockEventPublisher, PublisherConfig};
