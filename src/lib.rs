//! Game Coordinator - lobby to game server assignment
//!
//! Each lobby is pinned to one backend game server. First requests pick the
//! least-loaded server from a fixed pool, persist the choice and announce it
//! on the `game_servers` channel; later requests return the stored address.

pub mod balancer;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod metrics;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{CoordinatorError, CoordinatorResult, Result};
pub use types::*;

// Re-export key components
pub use balancer::{LoadEstimator, ServerLoad};
pub use coordinator::{AssignmentCoordinator, CoordinatorConfig, WriteMode};
pub use events::EventPublisher;
pub use store::{AssignmentStore, InMemoryAssignmentStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
