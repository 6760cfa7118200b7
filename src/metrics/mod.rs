//! Metrics and monitoring for the game coordinator
//!
//! Prometheus collection plus the health and metrics HTTP server.

pub mod collector;
pub mod health;
pub mod remote_check;

pub use collector::{
    AssignmentMetrics, EventMetrics, MetricsCollector, PerformanceMetrics, RequestOutcome,
    ServiceMetrics,
};
pub use health::{encode_metrics, HealthServer, HealthServerConfig};
pub use remote_check::{check_endpoint, endpoint_address, EndpointStatus};
