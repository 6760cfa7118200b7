//! Assignment API
//!
//! Serves `GET /assign_server?lobby_id=<id>`. The response body is the bare
//! server address as plain text.

use crate::coordinator::AssignmentCoordinator;
use crate::error::CoordinatorError;
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Path of the assignment endpoint
pub const ASSIGN_SERVER_PATH: &str = "/assign_server";

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignServerQuery {
    pub lobby_id: Option<String>,
}

/// HTTP front for the assignment coordinator
pub struct ApiServer {
    config: ApiServerConfig,
    coordinator: Arc<AssignmentCoordinator>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, coordinator: Arc<AssignmentCoordinator>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            coordinator,
            shutdown_tx,
        }
    }

    /// Bind and serve until `stop` is called
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid API server address")?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind API server to {}", addr))?;
        info!("Assignment API listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, router(self.coordinator.clone()))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API server shutdown signal received");
            })
            .await?;

        info!("API server stopped");
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to API server: {}", e);
        }
        Ok(())
    }
}

/// Build the API router around a coordinator
pub fn router(coordinator: Arc<AssignmentCoordinator>) -> Router {
    Router::new()
        .route(ASSIGN_SERVER_PATH, get(assign_server_handler))
        .with_state(coordinator)
}

async fn assign_server_handler(
    State(coordinator): State<Arc<AssignmentCoordinator>>,
    Query(query): Query<AssignServerQuery>,
) -> Response {
    let Some(lobby_id) = query.lobby_id else {
        debug!("Rejected assignment request without lobby_id");
        return plain_text(StatusCode::BAD_REQUEST, "missing lobby_id".to_string());
    };

    match coordinator.assign_server(&lobby_id).await {
        Ok(server_address) => plain_text(StatusCode::OK, server_address),
        Err(e) => error_response(&lobby_id, e),
    }
}

/// Map a coordinator failure to a status and a body that leaks no internals
fn error_response(lobby_id: &str, err: CoordinatorError) -> Response {
    match err {
        CoordinatorError::InvalidLobbyRequest { reason } => {
            debug!("Rejected lobby id {:?}: {}", lobby_id, reason);
            plain_text(StatusCode::BAD_REQUEST, "invalid lobby_id".to_string())
        }
        CoordinatorError::StoreUnavailable { message } => {
            error!("Assignment store unavailable for lobby {}: {}", lobby_id, message);
            plain_text(
                StatusCode::SERVICE_UNAVAILABLE,
                "assignment store unavailable".to_string(),
            )
        }
        other => {
            error!("Assignment failed for lobby {}: {}", lobby_id, other);
            plain_text(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    }
}

fn plain_text(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}
