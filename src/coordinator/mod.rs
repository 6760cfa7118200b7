//! Lobby to server assignment
//!
//! This module owns the lookup-or-assign flow, including persistence of new
//! assignments and their announcement on the event channel.

pub mod assignment;

// Re-export commonly used types
pub use assignment::{AssignmentCoordinator, CoordinatorConfig, CoordinatorStats, WriteMode};
