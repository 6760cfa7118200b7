//! Common types used throughout the coordinator service

use crate::error::{CoordinatorError, CoordinatorResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Externally supplied lobby identifier
pub type LobbyId = String;

/// Address of a backend game server, e.g. `127.0.0.1:7878`
pub type ServerAddress = String;

/// Ordered set of backend servers eligible for new assignments
///
/// The order is only used for tie-breaking: when several servers carry the
/// same load the one listed first wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ServerAddress>", into = "Vec<ServerAddress>")]
pub struct ServerPool {
    servers: Vec<ServerAddress>,
}

impl ServerPool {
    /// Build a pool, rejecting empty pools, blank addresses and duplicates
    pub fn new(servers: Vec<ServerAddress>) -> CoordinatorResult<Self> {
        if servers.is_empty() {
            return Err(CoordinatorError::ConfigurationError {
                message: "backend server pool cannot be empty".to_string(),
            });
        }

        let mut seen = HashSet::with_capacity(servers.len());
        for server in &servers {
            if server.trim().is_empty() {
                return Err(CoordinatorError::ConfigurationError {
                    message: "backend server address cannot be blank".to_string(),
                });
            }
            if !seen.insert(server.as_str()) {
                return Err(CoordinatorError::ConfigurationError {
                    message: format!("duplicate backend server address: {}", server),
                });
            }
        }

        Ok(Self { servers })
    }

    /// Parse a comma separated list such as `"10.0.0.1:7878,10.0.0.2:7878"`
    pub fn parse_list(list: &str) -> CoordinatorResult<Self> {
        Self::new(crate::utils::split_server_list(list))
    }

    pub fn as_slice(&self) -> &[ServerAddress] {
        &self.servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn contains(&self, server: &str) -> bool {
        self.servers.iter().any(|s| s == server)
    }
}

impl TryFrom<Vec<ServerAddress>> for ServerPool {
    type Error = CoordinatorError;

    fn try_from(servers: Vec<ServerAddress>) -> Result<Self, Self::Error> {
        Self::new(servers)
    }
}

impl From<ServerPool> for Vec<ServerAddress> {
    fn from(pool: ServerPool) -> Self {
        pool.servers
    }
}

impl std::fmt::Display for ServerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.servers.join(", "))
    }
}

/// Event announced on the notification channel when a lobby is assigned
///
/// The wire format is exactly `{"game_id": ..., "server_address": ...}`;
/// downstream consumers depend on these field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentEvent {
    pub game_id: LobbyId,
    pub server_address: ServerAddress,
}

impl AssignmentEvent {
    pub fn new(game_id: impl Into<LobbyId>, server_address: impl Into<ServerAddress>) -> Self {
        Self {
            game_id: game_id.into(),
            server_address: server_address.into(),
        }
    }
}

/// Result of resolving a lobby to a server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    pub lobby_id: LobbyId,
    pub server_address: ServerAddress,
    /// True only for the request that committed the assignment
    pub created: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_rejects_empty() {
        let err = ServerPool::new(vec![]).unwrap_err();
        assert!(matches!(err, CoordinatorError::ConfigurationError { .. }));
    }

    #[test]
    fn test_pool_rejects_duplicates_and_blanks() {
        let dup = ServerPool::new(vec!["A".to_string(), "A".to_string()]);
        assert!(matches!(
            dup,
            Err(CoordinatorError::ConfigurationError { .. })
        ));

        let blank = ServerPool::new(vec!["A".to_string(), "  ".to_string()]);
        assert!(matches!(
            blank,
            Err(CoordinatorError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn test_pool_keeps_order() {
        let pool = ServerPool::parse_list(" 10.0.0.2:7878, 10.0.0.1:7878 ,").unwrap();
        assert_eq!(pool.as_slice(), &["10.0.0.2:7878", "10.0.0.1:7878"]);
        assert!(pool.contains("10.0.0.1:7878"));
        assert!(!pool.contains("10.0.0.3:7878"));
        assert_eq!(pool.to_string(), "[10.0.0.2:7878, 10.0.0.1:7878]");
    }

    #[test]
    fn test_pool_deserialize_validates() {
        let ok: ServerPool = serde_json::from_str(r#"["A","B"]"#).unwrap();
        assert_eq!(ok.len(), 2);

        let empty: std::result::Result<ServerPool, _> = serde_json::from_str("[]");
        assert!(empty.is_err());
    }

    #[test]
    fn test_assignment_event_wire_format() {
        let event = AssignmentEvent::new("L1", "127.0.0.1:7878");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"game_id": "L1", "server_address": "127.0.0.1:7878"})
        );
    }
}
