//! Assignment store interface and implementations
//!
//! The coordinator treats persistence as a plain key-value store keyed by
//! lobby id. The store is assumed to be dedicated to this service: the load
//! estimator scans the whole keyspace and counts every value it finds.

pub mod memory;

pub use memory::InMemoryAssignmentStore;

use crate::error::CoordinatorResult;
use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

/// Stream of keys produced by a keyspace scan
///
/// An `Err` item means the scan was interrupted; consumers must abort rather
/// than treat the keys seen so far as complete.
pub type KeyStream = Pin<Box<dyn Stream<Item = CoordinatorResult<String>> + Send>>;

/// Key-value operations consumed by the coordinator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Read a value; `Ok(None)` means the key does not exist
    async fn get(&self, key: &str) -> CoordinatorResult<Option<String>>;

    /// Write a value with no expiration, replacing any existing one
    async fn set(&self, key: &str, value: &str) -> CoordinatorResult<()>;

    /// Write a value only if the key is absent; returns whether it was written
    async fn set_if_absent(&self, key: &str, value: &str) -> CoordinatorResult<bool>;

    /// Enumerate every key matching a glob pattern
    async fn scan(&self, pattern: &str) -> CoordinatorResult<KeyStream>;

    /// Cheap connectivity check
    async fn ping(&self) -> CoordinatorResult<()>;
}
