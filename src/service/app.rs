//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the server pool,
//! assignment store, event publisher and coordinator together, and owns the
//! API and metrics servers.

use crate::config::{AppConfig, EventBackend};
use crate::coordinator::{AssignmentCoordinator, CoordinatorConfig};
use crate::events::{
    AmqpConfig, AmqpConnection, AmqpEventPublisher, EventPublisher, LocalEventBus,
    PublisherConfig,
};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::service::http::{ApiServer, ApiServerConfig};
use crate::store::{AssignmentStore, InMemoryAssignmentStore};
use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Lookup-or-assign logic
    coordinator: Arc<AssignmentCoordinator>,

    /// Assignment store shared with the coordinator
    store: Arc<dyn AssignmentStore>,

    /// Present when the in-process event backend is selected
    local_bus: Option<Arc<LocalEventBus>>,

    /// Held open for the lifetime of the AMQP publisher
    amqp_connection: Mutex<Option<AmqpConnection>>,

    metrics_collector: Arc<MetricsCollector>,

    api_server: Arc<ApiServer>,
    health_server: Mutex<Option<Arc<HealthServer>>>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        Self::with_store(config, Arc::new(InMemoryAssignmentStore::new())).await
    }

    /// Initialize the application around an existing assignment store
    pub async fn with_store(
        config: AppConfig,
        store: Arc<dyn AssignmentStore>,
    ) -> Result<Self, ServiceError> {
        info!("Initializing game coordinator service");

        let pool = config
            .server_pool()
            .map_err(|e| ServiceError::Configuration {
                message: format!("Invalid server pool: {}", e),
            })?;
        info!(
            "Configuration: service={}, pool={}, events={}",
            config.service.name, pool, config.events.backend
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let (publisher, local_bus, amqp_connection) = Self::initialize_events(&config).await?;

        let coordinator_config = CoordinatorConfig {
            write_mode: config.assignment.write_mode,
            channel: config.events.channel.clone(),
            announce_timeout: config.announce_timeout(),
        };
        let coordinator = Arc::new(AssignmentCoordinator::with_metrics(
            pool,
            store.clone(),
            publisher,
            coordinator_config,
            metrics_collector.clone(),
        ));

        let api_server = Arc::new(ApiServer::new(
            ApiServerConfig {
                host: config.service.http_host.clone(),
                port: config.service.http_port,
            },
            coordinator.clone(),
        ));

        Ok(Self {
            config,
            coordinator,
            store,
            local_bus,
            amqp_connection: Mutex::new(amqp_connection),
            metrics_collector,
            api_server,
            health_server: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Build the event publisher selected by configuration
    async fn initialize_events(
        config: &AppConfig,
    ) -> Result<
        (
            Arc<dyn EventPublisher>,
            Option<Arc<LocalEventBus>>,
            Option<AmqpConnection>,
        ),
        ServiceError,
    > {
        match config.events.backend {
            EventBackend::Local => {
                info!(
                    "Using in-process event bus for channel '{}'",
                    config.events.channel
                );
                let bus = Arc::new(LocalEventBus::new(config.events.local_capacity));
                Ok((bus.clone(), Some(bus), None))
            }
            EventBackend::Amqp => {
                let mut amqp_config = AmqpConfig::from_url(&config.events.amqp_url).map_err(
                    |e| ServiceError::Configuration {
                        message: format!("Failed to parse AMQP URL: {}", e),
                    },
                )?;
                amqp_config.max_retries = config.events.max_retry_attempts;
                amqp_config.retry_delay_ms = config.events.retry_delay_ms;

                info!(
                    "Connecting to AMQP broker at {}:{}",
                    amqp_config.host, amqp_config.port
                );
                let connection =
                    AmqpConnection::new(amqp_config)
                        .await
                        .map_err(|e| ServiceError::AmqpConnection {
                            message: format!("Failed to connect to AMQP: {}", e),
                        })?;

                let channel =
                    connection
                        .open_channel()
                        .await
                        .map_err(|e| ServiceError::AmqpConnection {
                            message: format!("Failed to open publisher channel: {}", e),
                        })?;

                let publisher_config = PublisherConfig {
                    max_retries: config.events.max_retry_attempts,
                    retry_delay_ms: config.events.retry_delay_ms,
                    publish_timeout_ms: config.events.publish_timeout_ms,
                };
                let publisher = Arc::new(AmqpEventPublisher::new(channel, publisher_config));

                Ok((publisher, None, Some(connection)))
            }
        }
    }

    /// Start the API server, metrics server and background tasks
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting game coordinator service");

        *self.is_running.write().await = true;

        self.start_metrics_server().await;
        self.start_api_server().await;
        self.start_background_tasks().await;

        info!("✅ Game coordinator service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of game coordinator");

        *self.is_running.write().await = false;

        if let Err(e) = self.api_server.stop().await {
            warn!("Failed to stop API server: {}", e);
        }

        // Dropping the health server here breaks its reference back to us
        if let Some(health_server) = self.health_server.lock().await.take() {
            if let Err(e) = health_server.stop().await {
                warn!("Failed to stop metrics server: {}", e);
            } else {
                info!("✅ Metrics server stopped");
            }
        }

        self.stop_background_tasks().await;

        if let Some(connection) = self.amqp_connection.lock().await.take() {
            if let Err(e) = connection.close().await {
                warn!("Failed to close AMQP connection: {}", e);
            } else {
                info!("✅ AMQP connection closed");
            }
        }

        let final_stats =
            self.coordinator
                .get_stats()
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;

        info!("Final service statistics: {:?}", final_stats);
        info!("✅ Game coordinator shutdown completed");

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn coordinator(&self) -> Arc<AssignmentCoordinator> {
        self.coordinator.clone()
    }

    pub fn store(&self) -> Arc<dyn AssignmentStore> {
        self.store.clone()
    }

    /// The in-process bus, when that backend is active
    pub fn local_bus(&self) -> Option<Arc<LocalEventBus>> {
        self.local_bus.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    async fn start_metrics_server(self: &Arc<Self>) {
        let port = self.config.service.metrics_port;
        info!("Starting metrics and health endpoints on port {}", port);

        let health_server = Arc::new(
            HealthServer::new(
                HealthServerConfig {
                    port,
                    host: self.config.service.http_host.clone(),
                },
                self.metrics_collector.clone(),
            )
            .with_app_state(self.clone()),
        );
        *self.health_server.lock().await = Some(health_server.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = health_server.start().await {
                error!("Metrics server failed: {}", e);
            } else {
                info!("Metrics server task completed");
            }
        });
        self.background_tasks.lock().await.push(handle);
    }

    async fn start_api_server(&self) {
        let api_server = self.api_server.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = api_server.start().await {
                error!("API server failed: {}", e);
            } else {
                info!("API server task completed");
            }
        });
        self.background_tasks.lock().await.push(handle);

        info!(
            "✅ Assignment API started on {}:{}",
            self.config.service.http_host, self.config.service.http_port
        );
    }

    /// Periodic uptime and component health gauges
    async fn start_background_tasks(&self) {
        let coordinator = self.coordinator.clone();
        let metrics_collector = self.metrics_collector.clone();
        let is_running = self.is_running.clone();
        let started_at = self.started_at;

        let health_metrics_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            info!("Health metrics task started");

            while *is_running.read().await {
                interval.tick().await;

                metrics_collector.update_uptime(started_at.elapsed());

                let store_ok = coordinator.store_health().await.is_ok();
                let publisher_ok = coordinator.publisher_health().await;
                metrics_collector.update_component_health("assignment_store", store_ok);
                metrics_collector.update_component_health("event_publisher", publisher_ok);

                let status = match (store_ok, publisher_ok) {
                    (true, true) => 2,
                    (true, false) => 1,
                    _ => 0,
                };
                metrics_collector.update_health_status(status);

                debug!(
                    "Updated health metrics - store: {}, publisher: {}",
                    store_ok, publisher_ok
                );
            }

            info!("Health metrics task stopped");
        });

        self.background_tasks.lock().await.push(health_metrics_task);
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&self) {
        let tasks: Vec<JoinHandle<()>> = self.background_tasks.lock().await.drain(..).collect();
        if tasks.is_empty() {
            info!("No background tasks to stop");
            return;
        }

        let task_count = tasks.len();
        info!("Stopping {} background tasks...", task_count);

        // Servers exit on their shutdown signal; anything still running is aborted
        let grace = Duration::from_millis(500);
        for task in tasks {
            let abort = task.abort_handle();
            if tokio::time::timeout(grace, task).await.is_err() {
                debug!("Background task did not finish in {:?}, aborting", grace);
                abort.abort();
            }
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MessageUtils, GAME_SERVERS_CHANNEL};

    #[tokio::test]
    async fn test_new_with_local_backend() {
        let state = AppState::new(AppConfig::default()).await.unwrap();

        assert!(!state.is_running().await);
        assert!(state.local_bus().is_some());
        assert_eq!(state.coordinator().pool().len(), 2);
        assert_eq!(state.coordinator().config().channel, GAME_SERVERS_CHANNEL);
    }

    #[tokio::test]
    async fn test_invalid_pool_is_configuration_error() {
        let mut config = AppConfig::default();
        config.pool.servers.clear();

        let err = AppState::new(config).await.err().unwrap();
        assert!(matches!(err, ServiceError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_assignments_reach_local_subscribers() {
        let state = AppState::new(AppConfig::default()).await.unwrap();
        let mut rx = state
            .local_bus()
            .unwrap()
            .subscribe(GAME_SERVERS_CHANNEL)
            .unwrap();

        let server = state.coordinator().assign_server("L1").await.unwrap();
        let event = MessageUtils::deserialize_assignment_event(&rx.recv().await.unwrap()).unwrap();

        assert_eq!(event.game_id, "L1");
        assert_eq!(event.server_address, server);
    }

    #[tokio::test]
    async fn test_configured_service_spreads_new_lobbies() {
        let state = AppState::new(AppConfig::default()).await.unwrap();

        let mut assigned = Vec::new();
        for lobby in ["L1", "L2", "L3", "L4"] {
            assigned.push(state.coordinator().assign_server(lobby).await.unwrap());
        }
        assert_eq!(
            assigned,
            vec!["127.0.0.1:7878", "127.0.0.1:7879", "127.0.0.1:7878", "127.0.0.1:7879"]
        );

        let loads: Vec<u64> = state
            .coordinator()
            .server_loads()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.assignments)
            .collect();
        assert_eq!(loads, vec![2, 2]);
    }

    #[tokio::test]
    async fn test_shutdown_without_start() {
        let state = AppState::new(AppConfig::default()).await.unwrap();
        assert!(state.shutdown().await.is_ok());
        assert!(!state.is_running().await);
    }
}
