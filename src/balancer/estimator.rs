//! Least-loaded server selection
//!
//! Load is never stored. Every estimation scans the whole assignment keyspace
//! and tallies each assignment against the configured pool, so the cost grows
//! linearly with the number of live assignments.

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::store::AssignmentStore;
use crate::types::ServerAddress;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{debug, error};

/// Pattern matching every key in the dedicated assignment keyspace
pub const FULL_KEYSPACE: &str = "*";

/// Number of assignments currently pointing at one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerLoad {
    pub server_address: ServerAddress,
    pub assignments: u64,
}

/// Pick the entry with the fewest assignments; the earliest entry wins ties
pub fn select_least_loaded(loads: &[ServerLoad]) -> Option<&ServerLoad> {
    // min_by_key keeps the last minimum, so fold explicitly for first-wins
    loads.iter().fold(None, |best: Option<&ServerLoad>, load| match best {
        Some(current) if current.assignments <= load.assignments => Some(current),
        _ => Some(load),
    })
}

/// Computes per-server load from the assignment store
///
/// Assignments are stored under the bare lobby id, so the scan always covers
/// the full keyspace; any narrower pattern would miss them.
#[derive(Clone)]
pub struct LoadEstimator {
    store: Arc<dyn AssignmentStore>,
}

impl LoadEstimator {
    pub fn new(store: Arc<dyn AssignmentStore>) -> Self {
        Self { store }
    }

    /// Count assignments per server, returned in pool order
    ///
    /// Values that do not name a pool member are ignored, as are keys that
    /// vanish between the scan and the read. Any store fault aborts the whole
    /// count.
    pub async fn load_counts(&self, pool: &[ServerAddress]) -> CoordinatorResult<Vec<ServerLoad>> {
        if pool.is_empty() {
            return Err(CoordinatorError::ConfigurationError {
                message: "cannot estimate load over an empty server pool".to_string(),
            });
        }

        let mut counts = vec![0u64; pool.len()];
        let mut scanned = 0usize;

        let mut keys = self.store.scan(FULL_KEYSPACE).await.map_err(|e| {
            error!("Failed to start assignment scan: {}", e);
            e
        })?;

        while let Some(key) = keys.next().await {
            let key = key.map_err(|e| {
                error!("Assignment scan interrupted after {} keys: {}", scanned, e);
                e
            })?;
            scanned += 1;

            let Some(server) = self.store.get(&key).await? else {
                continue;
            };

            if let Some(idx) = pool.iter().position(|s| *s == server) {
                counts[idx] += 1;
            }
        }

        debug!("Scanned {} assignments across {} servers", scanned, pool.len());

        Ok(pool
            .iter()
            .zip(counts)
            .map(|(server_address, assignments)| ServerLoad {
                server_address: server_address.clone(),
                assignments,
            })
            .collect())
    }

    /// Return the server with the fewest current assignments
    pub async fn least_loaded(&self, pool: &[ServerAddress]) -> CoordinatorResult<ServerAddress> {
        let loads = self.load_counts(pool).await?;
        let chosen = select_least_loaded(&loads).ok_or_else(|| {
            CoordinatorError::ConfigurationError {
                message: "cannot estimate load over an empty server pool".to_string(),
            }
        })?;

        debug!(
            "Least loaded server is {} with {} assignments",
            chosen.server_address, chosen.assignments
        );
        Ok(chosen.server_address.clone())
    }
}
