//! REST API handlers

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::ws::ServerMessage;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the server
    pub status: String,
    /// Seconds since server started
    pub uptime_seconds: i64,
    /// Number of connected viewers
    pub client_count: usize,
    /// Whether the camera is currently open
    pub camera_open: bool,
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.uptime_seconds(),
        client_count: state.hub.client_count().await,
        camera_open: state.hub.camera_open(),
    })
}

/// Current viewers, in the same shape as the `client_update` message
pub async fn list_clients(State(state): State<Arc<AppState>>) -> Json<ServerMessage> {
    Json(ServerMessage::client_update(state.hub.clients().await))
}
