//! Shared test utilities for lookout-server integration tests

pub mod client;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lookout_core::{
    CameraConfig, DetectionConfig, FrameSource, MockCamera, MockCameraProbe, MockDetector,
};
use lookout_server::{AppState, LookoutServer, ServerConfig};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// A running server backed by a mock camera and a scriptable detector
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    pub camera: MockCameraProbe,
    pub detector: MockDetector,
    pub recordings: TempDir,
}

/// Creates a test server with default config
#[allow(dead_code)]
pub async fn create_test_server() -> TestServer {
    create_test_server_with_config(ServerConfig::default()).await
}

/// Creates a test server with custom config. The recordings directory is
/// always replaced by a fresh temp dir.
#[allow(dead_code)]
pub async fn create_test_server_with_config(mut config: ServerConfig) -> TestServer {
    let recordings = tempfile::tempdir().unwrap();
    config.recordings_dir = recordings.path().to_path_buf();

    let camera = MockCamera::new();
    let probe = camera.probe();
    let detector = MockDetector::new();
    let source = FrameSource::new(
        Box::new(camera),
        Box::new(detector.clone()),
        CameraConfig {
            device: "mock://".to_string(),
            width: 64,
            height: 48,
            fps: 30,
        },
        &DetectionConfig::default(),
    );

    let server = LookoutServer::new(config, source);
    let state = server.state();
    let addr = spawn_server(server).await;

    TestServer {
        addr,
        state,
        camera: probe,
        detector,
        recordings,
    }
}

/// Spawns server in background task, returns bound address
async fn spawn_server(server: LookoutServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    // Brief delay to ensure server is accepting connections
    tokio::time::sleep(Duration::from_millis(10)).await;

    addr
}

/// Polls `check` until it holds or two seconds pass.
#[allow(dead_code)]
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check().await
}
