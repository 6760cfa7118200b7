//! Error types for the game coordinator service
//!
//! Process-level code (configuration loading, bootstrap) uses the anyhow
//! `Result` alias. The assignment path uses the typed `CoordinatorError` so
//! callers can tell client errors from store outages.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Result type for store, estimator and coordinator operations
pub type CoordinatorResult<T> = std::result::Result<T, CoordinatorError>;

/// Custom error types for specific assignment scenarios
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Invalid lobby request: {reason}")]
    InvalidLobbyRequest { reason: String },

    #[error("Assignment store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Event serialization failed: {message}")]
    SerializationError { message: String },

    #[error("Event publish failed: {message}")]
    PublishFailed { message: String },

    #[error("Broker connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl CoordinatorError {
    /// Whether the caller, not the service, is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, CoordinatorError::InvalidLobbyRequest { .. })
    }

    pub(crate) fn store_unavailable(message: impl Into<String>) -> Self {
        CoordinatorError::StoreUnavailable {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        let client = CoordinatorError::InvalidLobbyRequest {
            reason: "lobby_id is required".to_string(),
        };
        assert!(client.is_client_error());

        let outage = CoordinatorError::store_unavailable("connection refused");
        assert!(!outage.is_client_error());
        assert_eq!(
            outage.to_string(),
            "Assignment store unavailable: connection refused"
        );
    }
}
