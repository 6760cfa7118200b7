//! Event channel names and payload serialization

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::types::AssignmentEvent;

/// Channel on which new assignments are announced
pub const GAME_SERVERS_CHANNEL: &str = "game_servers";

/// Content type attached to published payloads
pub const PAYLOAD_CONTENT_TYPE: &str = "application/json";

/// Payload serialization utilities
pub struct MessageUtils;

impl MessageUtils {
    /// Serialize an assignment event to its JSON wire form
    pub fn serialize_assignment_event(event: &AssignmentEvent) -> CoordinatorResult<Vec<u8>> {
        serde_json::to_vec(event).map_err(|e| CoordinatorError::SerializationError {
            message: format!("Failed to serialize assignment event: {}", e),
        })
    }

    /// Parse an assignment event received from a channel
    pub fn deserialize_assignment_event(bytes: &[u8]) -> CoordinatorResult<AssignmentEvent> {
        serde_json::from_slice(bytes).map_err(|e| CoordinatorError::SerializationError {
            message: format!("Failed to deserialize assignment event: {}", e),
        })
    }
}
