//! HTTP server module

mod api;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{Router, routing::get};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::warn;

use crate::AppState;
use crate::ws::ws_handler;

pub use api::HealthResponse;

/// Create the router: WebSocket endpoint, REST API, recordings download
pub fn create_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let recordings = ServeDir::new(state.hub.recordings_dir());
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/health", get(api::health))
        .route("/api/clients", get(api::list_clients))
        .nest_service("/recordings", recordings)
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// `*` anywhere in the list allows every origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
