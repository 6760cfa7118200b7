//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the game coordinator using
//! Prometheus metrics.

use crate::balancer::ServerLoad;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// How an assignment request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Hit,
    Created,
    LostRace,
    ClientError,
    StoreError,
    Failed,
}

impl RequestOutcome {
    fn as_label(self) -> &'static str {
        match self {
            RequestOutcome::Hit => "hit",
            RequestOutcome::Created => "created",
            RequestOutcome::LostRace => "lost_race",
            RequestOutcome::ClientError => "client_error",
            RequestOutcome::StoreError => "store_error",
            RequestOutcome::Failed => "failed",
        }
    }
}

/// Main metrics collector for the coordinator service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Assignment-related metrics
    assignment_metrics: AssignmentMetrics,

    /// Event publishing metrics
    event_metrics: EventMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Assignment-related metrics
#[derive(Clone)]
pub struct AssignmentMetrics {
    /// Assignment requests by outcome
    pub requests_total: IntCounterVec,

    /// Assignments created per backend server
    pub assignments_created_total: IntCounterVec,

    /// Assignments observed per backend server at the last estimation
    pub server_load: IntGaugeVec,
}

/// Event publishing metrics
#[derive(Clone)]
pub struct EventMetrics {
    /// Published events by channel and status
    pub events_published_total: IntCounterVec,

    /// Events that could not be serialized
    pub serialization_failures_total: IntCounter,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// End-to-end assignment request time
    pub assignment_duration: HistogramVec,

    /// Load estimation (full keyspace scan) time
    pub estimation_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let assignment_metrics = AssignmentMetrics::new(&registry)?;
        let event_metrics = EventMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            assignment_metrics,
            event_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn assignment(&self) -> &AssignmentMetrics {
        &self.assignment_metrics
    }

    pub fn events(&self) -> &EventMetrics {
        &self.event_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a finished assignment request
    pub fn record_request(&self, outcome: RequestOutcome, duration: Duration) {
        let label = outcome.as_label();

        self.assignment_metrics
            .requests_total
            .with_label_values(&[label])
            .inc();

        self.performance_metrics
            .assignment_duration
            .with_label_values(&[label])
            .observe(duration.as_secs_f64());
    }

    /// Record a newly committed assignment
    pub fn record_assignment_created(&self, server_address: &str) {
        self.assignment_metrics
            .assignments_created_total
            .with_label_values(&[server_address])
            .inc();
    }

    /// Record a load estimation made for a new assignment
    pub fn record_estimation(&self, loads: &[ServerLoad], duration: Duration) {
        self.update_server_loads(loads);

        self.performance_metrics
            .estimation_duration
            .observe(duration.as_secs_f64());
    }

    /// Set the per-server load gauges
    pub fn update_server_loads(&self, loads: &[ServerLoad]) {
        for load in loads {
            self.assignment_metrics
                .server_load
                .with_label_values(&[load.server_address.as_str()])
                .set(load.assignments as i64);
        }
    }

    /// Record a publish attempt on a channel
    pub fn record_event_published(&self, channel: &str, success: bool) {
        let status = if success { "success" } else { "failed" };
        self.event_metrics
            .events_published_total
            .with_label_values(&[channel, status])
            .inc();
    }

    pub fn record_serialization_failure(&self) {
        self.event_metrics.serialization_failures_total.inc();
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new(
            "game_coordinator_uptime_seconds",
            "Service uptime in seconds",
        )?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "game_coordinator_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new(
                "game_coordinator_component_health",
                "Component health status",
            ),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl AssignmentMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new(
                "game_coordinator_assignment_requests_total",
                "Assignment requests by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let assignments_created_total = IntCounterVec::new(
            Opts::new(
                "game_coordinator_assignments_created_total",
                "Assignments created per backend server",
            ),
            &["server"],
        )?;
        registry.register(Box::new(assignments_created_total.clone()))?;

        let server_load = IntGaugeVec::new(
            Opts::new(
                "game_coordinator_server_load",
                "Lobbies assigned per backend server at the last estimation",
            ),
            &["server"],
        )?;
        registry.register(Box::new(server_load.clone()))?;

        Ok(Self {
            requests_total,
            assignments_created_total,
            server_load,
        })
    }
}

impl EventMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let events_published_total = IntCounterVec::new(
            Opts::new(
                "game_coordinator_events_published_total",
                "Assignment events published by channel and status",
            ),
            &["channel", "status"],
        )?;
        registry.register(Box::new(events_published_total.clone()))?;

        let serialization_failures_total = IntCounter::new(
            "game_coordinator_event_serialization_failures_total",
            "Assignment events that could not be serialized",
        )?;
        registry.register(Box::new(serialization_failures_total.clone()))?;

        Ok(Self {
            events_published_total,
            serialization_failures_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let assignment_duration = HistogramVec::new(
            HistogramOpts::new(
                "game_coordinator_assignment_duration_seconds",
                "Assignment request processing time",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(assignment_duration.clone()))?;

        let estimation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "game_coordinator_estimation_duration_seconds",
                "Load estimation time (full keyspace scan)",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(estimation_duration.clone()))?;

        Ok(Self {
            assignment_duration,
            estimation_duration,
        })
    }
}
