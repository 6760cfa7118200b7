//! In-memory assignment store
//!
//! Backed by a `RwLock<HashMap>`; single-key operations are atomic, which is
//! all the coordinator relies on. An availability switch lets tests and local
//! runs simulate a store outage.

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::store::{AssignmentStore, KeyStream};
use crate::utils::glob_matches;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::debug;

#[derive(Debug)]
pub struct InMemoryAssignmentStore {
    entries: RwLock<HashMap<String, String>>,
    available: AtomicBool,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle simulated availability; every operation fails while unavailable
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all entries (for tests and debugging)
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries
            .read()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    fn ensure_available(&self) -> CoordinatorResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(CoordinatorError::store_unavailable(
                "in-memory store marked unavailable",
            ))
        }
    }

    fn read_lock_error() -> CoordinatorError {
        CoordinatorError::InternalError {
            message: "Failed to acquire store read lock".to_string(),
        }
    }

    fn write_lock_error() -> CoordinatorError {
        CoordinatorError::InternalError {
            message: "Failed to acquire store write lock".to_string(),
        }
    }
}

impl Default for InMemoryAssignmentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn get(&self, key: &str) -> CoordinatorResult<Option<String>> {
        self.ensure_available()?;
        let entries = self.entries.read().map_err(|_| Self::read_lock_error())?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> CoordinatorResult<()> {
        self.ensure_available()?;
        let mut entries = self.entries.write().map_err(|_| Self::write_lock_error())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> CoordinatorResult<bool> {
        self.ensure_available()?;
        let mut entries = self.entries.write().map_err(|_| Self::write_lock_error())?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn scan(&self, pattern: &str) -> CoordinatorResult<KeyStream> {
        self.ensure_available()?;
        let keys: Vec<String> = {
            let entries = self.entries.read().map_err(|_| Self::read_lock_error())?;
            entries
                .keys()
                .filter(|key| glob_matches(pattern, key))
                .cloned()
                .collect()
        };

        debug!("Scan '{}' matched {} keys", pattern, keys.len());
        Ok(Box::pin(tokio_stream::iter(keys.into_iter().map(Ok))))
    }

    async fn ping(&self) -> CoordinatorResult<()> {
        self.ensure_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_get_and_set() {
        let store = InMemoryAssignmentStore::new();
        assert_eq!(store.get("L1").await.unwrap(), None);

        store.set("L1", "A").await.unwrap();
        assert_eq!(store.get("L1").await.unwrap(), Some("A".to_string()));

        store.set("L1", "B").await.unwrap();
        assert_eq!(store.get("L1").await.unwrap(), Some("B".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_set_if_absent_only_writes_once() {
        let store = InMemoryAssignmentStore::new();
        assert!(store.set_if_absent("L1", "A").await.unwrap());
        assert!(!store.set_if_absent("L1", "B").await.unwrap());
        assert_eq!(store.get("L1").await.unwrap(), Some("A".to_string()));
    }

    #[tokio::test]
    async fn test_scan_filters_by_pattern() {
        let store = InMemoryAssignmentStore::new();
        store.set("lobby:1", "A").await.unwrap();
        store.set("lobby:2", "B").await.unwrap();
        store.set("other", "A").await.unwrap();

        let mut keys: Vec<String> = store
            .scan("lobby:*")
            .await
            .unwrap()
            .collect::<CoordinatorResult<Vec<_>>>()
            .await
            .unwrap();
        keys.sort();
        assert_eq!(keys, vec!["lobby:1", "lobby:2"]);

        let all = store.scan("*").await.unwrap().collect::<Vec<_>>().await;
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_operation() {
        let store = InMemoryAssignmentStore::new();
        store.set("L1", "A").await.unwrap();
        store.set_available(false);

        assert!(matches!(
            store.get("L1").await,
            Err(CoordinatorError::StoreUnavailable { .. })
        ));
        assert!(matches!(
            store.set("L2", "A").await,
            Err(CoordinatorError::StoreUnavailable { .. })
        ));
        assert!(store.scan("*").await.is_err());
        assert!(store.ping().await.is_err());

        store.set_available(true);
        assert!(store.ping().await.is_ok());
        assert_eq!(store.snapshot().get("L1"), Some(&"A".to_string()));
    }
}
