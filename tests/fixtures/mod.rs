//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use game_coordinator::coordinator::{AssignmentCoordinator, CoordinatorConfig};
use game_coordinator::error::{CoordinatorError, CoordinatorResult};
use game_coordinator::events::{EventPublisher, LocalEventBus, MessageUtils, MockEventPublisher};
use game_coordinator::metrics::MetricsCollector;
use game_coordinator::store::{AssignmentStore, InMemoryAssignmentStore, KeyStream};
use game_coordinator::types::{AssignmentEvent, ServerPool};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const SERVER_A: &str = "127.0.0.1:7878";
pub const SERVER_B: &str = "127.0.0.1:7879";

pub fn pool(servers: &[&str]) -> ServerPool {
    ServerPool::new(servers.iter().map(|s| s.to_string()).collect()).expect("valid test pool")
}

pub fn two_server_pool() -> ServerPool {
    pool(&[SERVER_A, SERVER_B])
}

/// Store wrapper that yields to the scheduler before every operation
///
/// The in-memory store never suspends, so concurrent requests on one runtime
/// would otherwise run back to back. Yielding lets their lookups, estimates
/// and writes interleave the way they would against a networked store.
pub struct InterleavingStore {
    inner: Arc<InMemoryAssignmentStore>,
    fail_writes: AtomicBool,
}

impl InterleavingStore {
    pub fn new(inner: Arc<InMemoryAssignmentStore>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Reads keep working while writes fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writes(&self) -> CoordinatorResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoordinatorError::StoreUnavailable {
                message: "write rejected".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AssignmentStore for InterleavingStore {
    async fn get(&self, key: &str) -> CoordinatorResult<Option<String>> {
        tokio::task::yield_now().await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> CoordinatorResult<()> {
        tokio::task::yield_now().await;
        self.check_writes()?;
        self.inner.set(key, value).await
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> CoordinatorResult<bool> {
        tokio::task::yield_now().await;
        self.check_writes()?;
        self.inner.set_if_absent(key, value).await
    }

    async fn scan(&self, pattern: &str) -> CoordinatorResult<KeyStream> {
        tokio::task::yield_now().await;
        self.inner.scan(pattern).await
    }

    async fn ping(&self) -> CoordinatorResult<()> {
        self.inner.ping().await
    }
}

/// Coordinator wired to an in-memory store and a recording publisher
pub struct TestSystem {
    pub coordinator: Arc<AssignmentCoordinator>,
    pub store: Arc<InMemoryAssignmentStore>,
    pub publisher: Arc<MockEventPublisher>,
}

pub fn create_test_system(pool: ServerPool) -> TestSystem {
    create_test_system_with(pool, CoordinatorConfig::default())
}

pub fn create_test_system_with(pool: ServerPool, config: CoordinatorConfig) -> TestSystem {
    let store = Arc::new(InMemoryAssignmentStore::new());
    let publisher = Arc::new(MockEventPublisher::new());
    let coordinator = Arc::new(AssignmentCoordinator::with_metrics(
        pool,
        store.clone(),
        publisher.clone(),
        config,
        Arc::new(MetricsCollector::new().expect("metrics collector")),
    ));

    TestSystem {
        coordinator,
        store,
        publisher,
    }
}

/// Coordinator whose store operations interleave across tasks
pub fn create_interleaving_system(
    pool: ServerPool,
    config: CoordinatorConfig,
) -> (TestSystem, Arc<InterleavingStore>) {
    let store = Arc::new(InMemoryAssignmentStore::new());
    let interleaving = Arc::new(InterleavingStore::new(store.clone()));
    let publisher = Arc::new(MockEventPublisher::new());
    let coordinator = Arc::new(AssignmentCoordinator::with_metrics(
        pool,
        interleaving.clone(),
        publisher.clone(),
        config,
        Arc::new(MetricsCollector::new().expect("metrics collector")),
    ));

    (
        TestSystem {
            coordinator,
            store,
            publisher,
        },
        interleaving,
    )
}

/// Coordinator publishing onto an in-process bus
pub fn create_bus_system(pool: ServerPool) -> (Arc<AssignmentCoordinator>, Arc<LocalEventBus>) {
    let bus = Arc::new(LocalEventBus::default());
    let publisher: Arc<dyn EventPublisher> = bus.clone();
    let coordinator = Arc::new(AssignmentCoordinator::new(
        pool,
        Arc::new(InMemoryAssignmentStore::new()),
        publisher,
    )
    .expect("coordinator"));
    (coordinator, bus)
}

/// Decode everything a recording publisher saw on one channel
pub fn published_events(publisher: &MockEventPublisher, channel: &str) -> Vec<AssignmentEvent> {
    publisher
        .published()
        .into_iter()
        .filter(|(c, _)| c == channel)
        .map(|(_, payload)| {
            MessageUtils::deserialize_assignment_event(&payload).expect("valid event payload")
        })
        .collect()
}
