//! Service layer for the game coordinator
//!
//! This module contains the main application state, the assignment API and
//! health reporting for the production service.

pub mod app;
pub mod health;
pub mod http;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
pub use http::{ApiServer, ApiServerConfig};
