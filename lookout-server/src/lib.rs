//! lookout-server - WebSocket gateway and frame broadcaster
//!
//! Owns the [`SessionHub`] (viewer registry plus the shared frame source) and
//! runs one [`Broadcaster`] task that pushes annotated frames to every
//! connected viewer. Viewers connect over `/ws`; see [`ws::ClientMessage`]
//! and [`ws::ServerMessage`] for the protocol.

pub mod broadcaster;
mod error;
pub mod http;
pub mod hub;
pub mod outbox;
mod state;
pub mod ws;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lookout_core::FrameSource;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use broadcaster::Broadcaster;
pub use error::ServerError;
pub use http::create_router;
pub use hub::SessionHub;
pub use state::AppState;

/// The main lookout server
pub struct LookoutServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl LookoutServer {
    /// Create a server around an already-built frame source
    pub fn new(config: ServerConfig, source: FrameSource) -> Self {
        let hub = SessionHub::new(source, config.max_clients, config.recordings_dir.clone())
            .with_source_budget(config.broadcast.frame_budget());
        Self {
            config,
            state: Arc::new(AppState::new(hub)),
        }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shared application state
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// Run the server, binding to the configured address
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;
        self.run_with_listener(listener).await
    }

    /// Run the server on an existing listener until the shutdown token is
    /// cancelled. On the way out the broadcaster is stopped and the camera
    /// closed, finalizing any recording.
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        tracing::info!("lookout server listening on {}", local);

        let shutdown = self.state.shutdown.clone();
        let broadcaster = Broadcaster::new(
            Arc::clone(&self.state.hub),
            self.config.broadcast.clone(),
            shutdown.clone(),
        )
        .spawn();

        let router = create_router(Arc::clone(&self.state), &self.config.cors_origins);
        let signal = shutdown.clone();
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));

        shutdown.cancel();
        if let Err(e) = broadcaster.await {
            tracing::warn!("Broadcaster task failed: {}", e);
        }
        self.state.hub.shutdown().await;
        tracing::info!("lookout server stopped");

        served
    }
}

/// Frame broadcast settings
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastConfig {
    /// Target cycles per second
    pub fps: u32,
    /// JPEG quality for broadcast frames, 1-100
    pub jpeg_quality: u8,
    /// Longest a single capture may take before the cycle is failed. Also
    /// bounds how long viewer requests wait on the frame source.
    pub frame_budget_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            jpeg_quality: 80,
            frame_budget_ms: 500,
        }
    }
}

impl BroadcastConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }

    pub fn frame_budget(&self) -> Duration {
        Duration::from_millis(self.frame_budget_ms.max(1))
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Viewers allowed at once
    pub max_clients: usize,
    /// Allowed CORS origins; `*` allows all
    pub cors_origins: Vec<String>,
    pub broadcast: BroadcastConfig,
    /// Where recordings are written and served from
    pub recordings_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_clients: 5,
            cors_origins: vec!["*".to_string()],
            broadcast: BroadcastConfig::default(),
            recordings_dir: PathBuf::from("static/uploads"),
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with the specified host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Returns the socket address string (e.g., "0.0.0.0:5000")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookout_core::{CameraConfig, DetectionConfig, MockCamera, MockDetector};

    fn source() -> FrameSource {
        FrameSource::new(
            Box::new(MockCamera::new()),
            Box::new(MockDetector::new()),
            CameraConfig::default(),
            &DetectionConfig::default(),
        )
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.max_clients, 5);
        assert_eq!(config.broadcast.fps, 30);
        assert_eq!(config.broadcast.jpeg_quality, 80);
    }

    #[test]
    fn test_server_config_addr() {
        let config = ServerConfig::new("127.0.0.1", 8080);
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn broadcast_period_follows_fps() {
        let config = BroadcastConfig {
            fps: 4,
            ..BroadcastConfig::default()
        };
        assert_eq!(config.period(), Duration::from_millis(250));

        let zero = BroadcastConfig {
            fps: 0,
            ..BroadcastConfig::default()
        };
        assert_eq!(zero.period(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn cancelled_server_returns_and_closes_camera() {
        let server = LookoutServer::new(ServerConfig::default(), source());
        let state = server.state();
        let token = server.shutdown_token();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let handle = tokio::spawn(server.run_with_listener(listener));
        token.cancel();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server should stop")
            .unwrap()
            .unwrap();
        assert!(!state.hub.camera_open());
    }

    #[tokio::test]
    async fn bind_failure_names_address() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let server = LookoutServer::new(ServerConfig::new("127.0.0.1", port), source());
        let err = server.run().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
        assert!(err.to_string().contains(&port.to_string()));
    }
}
