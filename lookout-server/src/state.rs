//! Shared application state for the lookout server

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::hub::SessionHub;

/// Shared application state accessible by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Viewer membership and the shared frame source
    pub hub: Arc<SessionHub>,
    /// Cancelled when the server is shutting down
    pub shutdown: CancellationToken,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(hub: SessionHub) -> Self {
        Self {
            hub: Arc::new(hub),
            shutdown: CancellationToken::new(),
            started_at: Utc::now(),
        }
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
