//! HTTP check against a running coordinator's health endpoint
//!
//! Used by `--health-check` so a container health check asks the live
//! process instead of building a second one.

use bytes::Bytes;
use http_body_util::Empty;
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Outcome of a single health request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointStatus {
    /// The endpoint answered 2xx
    Healthy,
    /// The endpoint answered with another status
    Unhealthy(u16),
    /// Nothing answered within the timeout
    Unreachable,
}

impl EndpointStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, EndpointStatus::Healthy)
    }
}

impl std::fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointStatus::Healthy => write!(f, "healthy"),
            EndpointStatus::Unhealthy(status) => write!(f, "unhealthy (HTTP {})", status),
            EndpointStatus::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Address to dial for a server bound to `host`
///
/// Wildcard binds are reached over loopback.
pub fn endpoint_address(host: &str, port: u16) -> String {
    match host {
        "0.0.0.0" | "" => format!("127.0.0.1:{}", port),
        "::" | "[::]" => format!("[::1]:{}", port),
        other => format!("{}:{}", other, port),
    }
}

/// GET `path` on `address` and classify the answer
pub async fn check_endpoint(address: &str, path: &str, timeout: Duration) -> EndpointStatus {
    let uri = format!("http://{}{}", address, path);

    let result = tokio::time::timeout(timeout, async {
        let stream = match TcpStream::connect(address).await {
            Ok(stream) => stream,
            Err(e) => {
                debug!("Health request connection to {} failed: {}", uri, e);
                return EndpointStatus::Unreachable;
            }
        };

        let (mut sender, conn) =
            match hyper::client::conn::http1::handshake(TokioIo::new(stream)).await {
                Ok(pair) => pair,
                Err(e) => {
                    debug!("Health request handshake with {} failed: {}", uri, e);
                    return EndpointStatus::Unreachable;
                }
            };

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("Health request connection closed: {}", e);
            }
        });

        let request = match http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header(http::header::HOST, address)
            .header(http::header::USER_AGENT, "game-coordinator-health")
            .body(Empty::<Bytes>::new())
        {
            Ok(request) => request,
            Err(e) => {
                debug!("Invalid health request request for {}: {}", uri, e);
                return EndpointStatus::Unreachable;
            }
        };

        match sender.send_request(request).await {
            Ok(response) if response.status().is_success() => EndpointStatus::Healthy,
            Ok(response) => EndpointStatus::Unhealthy(response.status().as_u16()),
            Err(e) => {
                debug!("Health request request to {} failed: {}", uri, e);
                EndpointStatus::Unreachable
            }
        }
    })
    .await;

    result.unwrap_or_else(|_| {
        debug!("Health request to {} timed out", uri);
        EndpointStatus::Unreachable
    })
}
