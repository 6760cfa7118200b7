//! Assignment coordinator
//!
//! Single entry point answering "which server hosts lobby X". A lookup hit
//! returns the stored address untouched. A miss runs the load estimator,
//! commits the chosen address and announces it on the event channel.

use crate::balancer::{LoadEstimator, ServerLoad};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::events::messages::{MessageUtils, GAME_SERVERS_CHANNEL};
use crate::events::publisher::EventPublisher;
use crate::metrics::collector::RequestOutcome;
use crate::metrics::MetricsCollector;
use crate::store::AssignmentStore;
use crate::types::{AssignmentEvent, AssignmentOutcome, ServerAddress, ServerPool};
use crate::utils::validate_lobby_id;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How a new assignment is committed to the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Conditional write; only the request that creates the key announces it
    #[default]
    CreateIfAbsent,
    /// Unconditional write; concurrent first requests may each announce and
    /// the last write decides the stored value
    LastWriteWins,
}

impl std::str::FromStr for WriteMode {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "create_if_absent" => Ok(WriteMode::CreateIfAbsent),
            "last_write_wins" => Ok(WriteMode::LastWriteWins),
            other => Err(CoordinatorError::ConfigurationError {
                message: format!("Unknown write mode: {}", other),
            }),
        }
    }
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteMode::CreateIfAbsent => write!(f, "create_if_absent"),
            WriteMode::LastWriteWins => write!(f, "last_write_wins"),
        }
    }
}

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub write_mode: WriteMode,
    /// Channel new assignments are announced on
    pub channel: String,
    /// Upper bound on the time a request spends announcing, retries included
    pub announce_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            write_mode: WriteMode::default(),
            channel: GAME_SERVERS_CHANNEL.to_string(),
            announce_timeout: Duration::from_secs(2),
        }
    }
}

/// Statistics about coordinator operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStats {
    /// Total assignment requests received
    pub requests: u64,
    /// Requests answered from an existing assignment
    pub hits: u64,
    /// Assignments committed by this process
    pub assignments_created: u64,
    /// Conditional writes lost to a concurrent request
    pub lost_races: u64,
    /// Requests rejected as client errors
    pub client_errors: u64,
    /// Requests failed by the store or other server faults
    pub failures: u64,
    /// Announcements that could not be published
    pub publish_failures: u64,
    /// Announcements that could not be serialized
    pub serialization_failures: u64,
}

/// The assignment coordinator
#[derive(Clone)]
pub struct AssignmentCoordinator {
    /// Backend servers eligible for new assignments
    pool: ServerPool,
    /// Lobby id -> server address
    store: Arc<dyn AssignmentStore>,
    /// Least-loaded selection over the store
    estimator: LoadEstimator,
    /// Announcement channel
    publisher: Arc<dyn EventPublisher>,
    config: CoordinatorConfig,
    stats: Arc<RwLock<CoordinatorStats>>,
    metrics_collector: Arc<MetricsCollector>,
}

impl AssignmentCoordinator {
    /// Create a new coordinator with default settings
    pub fn new(
        pool: ServerPool,
        store: Arc<dyn AssignmentStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> CoordinatorResult<Self> {
        let metrics_collector =
            MetricsCollector::new().map_err(|e| CoordinatorError::InternalError {
                message: format!("Failed to create metrics collector: {}", e),
            })?;

        Ok(Self::with_metrics(
            pool,
            store,
            publisher,
            CoordinatorConfig::default(),
            Arc::new(metrics_collector),
        ))
    }

    /// Create a coordinator with explicit settings and metrics collector
    pub fn with_metrics(
        pool: ServerPool,
        store: Arc<dyn AssignmentStore>,
        publisher: Arc<dyn EventPublisher>,
        config: CoordinatorConfig,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        let estimator = LoadEstimator::new(store.clone());

        Self {
            pool,
            store,
            estimator,
            publisher,
            config,
            stats: Arc::new(RwLock::new(CoordinatorStats::default())),
            metrics_collector,
        }
    }

    /// Return the server assigned to a lobby, assigning one if needed
    pub async fn assign_server(&self, lobby_id: &str) -> CoordinatorResult<ServerAddress> {
        self.resolve(lobby_id)
            .await
            .map(|outcome| outcome.server_address)
    }

    /// Resolve a lobby and report whether this call created the assignment
    pub async fn resolve(&self, lobby_id: &str) -> CoordinatorResult<AssignmentOutcome> {
        let start_time = Instant::now();

        let result = self.resolve_inner(lobby_id).await;

        let outcome = match &result {
            Ok((_, outcome)) => *outcome,
            Err(CoordinatorError::InvalidLobbyRequest { .. }) => RequestOutcome::ClientError,
            Err(CoordinatorError::StoreUnavailable { .. }) => RequestOutcome::StoreError,
            Err(_) => RequestOutcome::Failed,
        };
        self.metrics_collector
            .record_request(outcome, start_time.elapsed());

        self.update_stats(|stats| {
            stats.requests += 1;
            match &result {
                Ok(_) => {}
                Err(e) if e.is_client_error() => stats.client_errors += 1,
                Err(_) => stats.failures += 1,
            }
        });

        if let Err(e) = &result {
            if e.is_client_error() {
                debug!("Rejected assignment request: {}", e);
            } else {
                error!(
                    "Assignment failed - lobby: '{}', time: {:.2}ms, error: {}",
                    lobby_id,
                    start_time.elapsed().as_secs_f64() * 1000.0,
                    e
                );
            }
        }

        result.map(|(assignment, _)| assignment)
    }

    async fn resolve_inner(
        &self,
        lobby_id: &str,
    ) -> CoordinatorResult<(AssignmentOutcome, RequestOutcome)> {
        validate_lobby_id(lobby_id)?;

        // A store fault here must not be mistaken for "no assignment yet"
        if let Some(server_address) = self.store.get(lobby_id).await? {
            debug!("Lobby '{}' already assigned to {}", lobby_id, server_address);
            self.update_stats(|stats| stats.hits += 1);
            let assignment = AssignmentOutcome {
                lobby_id: lobby_id.to_string(),
                server_address,
                created: false,
            };
            return Ok((assignment, RequestOutcome::Hit));
        }

        let server_address = self.estimate().await?;

        match self.config.write_mode {
            WriteMode::LastWriteWins => {
                self.store.set(lobby_id, &server_address).await?;
            }
            WriteMode::CreateIfAbsent => {
                if !self.store.set_if_absent(lobby_id, &server_address).await? {
                    let assignment = self.adopt_winner(lobby_id).await?;
                    return Ok((assignment, RequestOutcome::LostRace));
                }
            }
        }

        info!("Assigned lobby '{}' to {}", lobby_id, server_address);
        self.update_stats(|stats| stats.assignments_created += 1);
        self.metrics_collector
            .record_assignment_created(&server_address);

        self.announce(lobby_id, &server_address).await;

        let assignment = AssignmentOutcome {
            lobby_id: lobby_id.to_string(),
            server_address,
            created: true,
        };
        Ok((assignment, RequestOutcome::Created))
    }

    /// Run the load estimator over the configured pool
    async fn estimate(&self) -> CoordinatorResult<ServerAddress> {
        let start_time = Instant::now();
        let loads = self.estimator.load_counts(self.pool.as_slice()).await?;
        self.metrics_collector
            .record_estimation(&loads, start_time.elapsed());

        crate::balancer::select_least_loaded(&loads)
            .map(|load| load.server_address.clone())
            .ok_or_else(|| CoordinatorError::ConfigurationError {
                message: "backend server pool is empty".to_string(),
            })
    }

    /// Another request committed first; return what it stored
    async fn adopt_winner(&self, lobby_id: &str) -> CoordinatorResult<AssignmentOutcome> {
        let server_address = self.store.get(lobby_id).await?.ok_or_else(|| {
            CoordinatorError::InternalError {
                message: format!(
                    "assignment for lobby '{}' vanished after a conflicting write",
                    lobby_id
                ),
            }
        })?;

        info!(
            "Lobby '{}' was assigned concurrently to {}, using existing assignment",
            lobby_id, server_address
        );
        self.update_stats(|stats| stats.lost_races += 1);

        Ok(AssignmentOutcome {
            lobby_id: lobby_id.to_string(),
            server_address,
            created: false,
        })
    }

    /// Best-effort announcement; failures are logged and counted only
    async fn announce(&self, lobby_id: &str, server_address: &str) {
        let event = AssignmentEvent::new(lobby_id, server_address);

        let payload = match MessageUtils::serialize_assignment_event(&event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Not announcing assignment of '{}': {}", lobby_id, e);
                self.update_stats(|stats| stats.serialization_failures += 1);
                self.metrics_collector.record_serialization_failure();
                return;
            }
        };

        let publish = self.publisher.publish(&self.config.channel, payload);
        let result = match tokio::time::timeout(self.config.announce_timeout, publish).await {
            Ok(result) => result,
            Err(_) => Err(CoordinatorError::PublishFailed {
                message: format!(
                    "announcement not confirmed within {:?}",
                    self.config.announce_timeout
                ),
            }),
        };

        match result {
            Ok(()) => {
                debug!(
                    "Announced lobby '{}' -> {} on '{}'",
                    lobby_id, server_address, self.config.channel
                );
                self.metrics_collector
                    .record_event_published(&self.config.channel, true);
            }
            Err(e) => {
                warn!(
                    "Failed to announce assignment of lobby '{}' on '{}': {}",
                    lobby_id, self.config.channel, e
                );
                self.update_stats(|stats| stats.publish_failures += 1);
                self.metrics_collector
                    .record_event_published(&self.config.channel, false);
            }
        }
    }

    /// Read-only lookup; never creates an assignment
    pub async fn lookup(&self, lobby_id: &str) -> CoordinatorResult<Option<ServerAddress>> {
        validate_lobby_id(lobby_id)?;
        self.store.get(lobby_id).await
    }

    /// Current load of every pool member, in pool order
    ///
    /// Runs the same full scan as an estimation, so keep it off hot paths.
    pub async fn server_loads(&self) -> CoordinatorResult<Vec<ServerLoad>> {
        let loads = self.estimator.load_counts(self.pool.as_slice()).await?;
        self.metrics_collector.update_server_loads(&loads);
        Ok(loads)
    }

    /// Check the store is reachable
    pub async fn store_health(&self) -> CoordinatorResult<()> {
        self.store.ping().await
    }

    /// Check the event transport looks usable
    pub async fn publisher_health(&self) -> bool {
        self.publisher.is_healthy().await
    }

    pub fn get_stats(&self) -> CoordinatorResult<CoordinatorStats> {
        self.stats
            .read()
            .map(|stats| stats.clone())
            .map_err(|_| CoordinatorError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })
    }

    pub fn pool(&self) -> &ServerPool {
        &self.pool
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    fn update_stats(&self, update: impl FnOnce(&mut CoordinatorStats)) {
        match self.stats.write() {
            Ok(mut stats) => update(&mut stats),
            Err(_) => warn!("Failed to acquire stats lock, skipping stats update"),
        }
    }
}
