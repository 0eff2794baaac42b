//! `lookout serve`: run the viewer server in the foreground
//!
//! Startup order matters: the detector is loaded before anything binds, so
//! a missing or broken model aborts immediately. The camera is only opened
//! once the first viewer connects.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use lookout_core::{DetectorKind, FrameSource, camera, detect};
use lookout_server::LookoutServer;
use tracing::{info, warn};

use crate::config::{ConfigLoader, LookoutConfig};

/// Arguments for the serve command. Each overrides the loaded config.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Maximum simultaneous viewers
    #[arg(long)]
    pub max_clients: Option<usize>,

    /// Capture device (`stub://` or `/dev/videoN`)
    #[arg(long)]
    pub device: Option<String>,

    /// Detector backend (stub, tract)
    #[arg(long)]
    pub detector: Option<DetectorKind>,

    /// Model file for the detector
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Minimum score for a detection to count (exclusive)
    #[arg(long)]
    pub confidence: Option<f32>,

    /// Directory recordings are written to and served from
    #[arg(long)]
    pub recordings_dir: Option<PathBuf>,

    /// Start with detection turned off
    #[arg(long)]
    pub no_detection: bool,
}

impl ServeArgs {
    fn apply(&self, config: &mut LookoutConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(max) = self.max_clients {
            config.server.max_clients = max;
        }
        if let Some(device) = &self.device {
            config.camera.device = device.clone();
        }
        if let Some(backend) = self.detector {
            config.detection.backend = backend;
        }
        if let Some(model) = &self.model {
            config.detection.model_path = Some(model.clone());
        }
        if let Some(confidence) = self.confidence {
            config.detection.confidence = confidence;
        }
        if let Some(dir) = &self.recordings_dir {
            config.recording.dir = dir.clone();
        }
        if self.no_detection {
            config.detection.enabled = false;
        }
    }
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let mut config = ConfigLoader::load()?;
    args.apply(&mut config);
    config.validate()?;

    let server = build_server(&config)?;
    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, shutting down"),
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
        shutdown.cancel();
    });

    info!(
        "Starting lookout on {}:{} (camera {}, detector {})",
        config.server.host, config.server.port, config.camera.device, config.detection.backend
    );
    server.run().await.map_err(Into::into)
}

/// Load the detector, construct the camera backend and wire up the server.
fn build_server(config: &LookoutConfig) -> Result<LookoutServer> {
    std::fs::create_dir_all(&config.recording.dir).with_context(|| {
        format!(
            "failed to create recordings directory {}",
            config.recording.dir.display()
        )
    })?;

    let detector = detect::build_detector(&config.detection).with_context(|| {
        format!("failed to load {} detector", config.detection.backend)
    })?;
    let camera = camera::for_device(&config.camera.device)
        .with_context(|| format!("unusable capture device {}", config.camera.device))?;

    let source = FrameSource::new(
        camera,
        detector,
        config.camera.clone(),
        &config.detection,
    );
    Ok(LookoutServer::new(config.to_server_config(), source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        serve: ServeArgs,
    }

    #[test]
    fn test_serve_args_defaults() {
        let cli = TestCli::parse_from(["test"]);
        assert!(cli.serve.port.is_none());
        assert!(cli.serve.host.is_none());
        assert!(cli.serve.detector.is_none());
        assert!(!cli.serve.no_detection);

        let mut config = LookoutConfig::default();
        cli.serve.apply(&mut config);
        assert_eq!(config.server.port, 5000);
        assert!(config.detection.enabled);
    }

    #[test]
    fn args_override_config() {
        let cli = TestCli::parse_from([
            "test",
            "--port",
            "8080",
            "--max-clients",
            "2",
            "--detector",
            "tract",
            "--model",
            "/models/yolo.onnx",
            "--confidence",
            "0.6",
            "--no-detection",
        ]);
        let mut config = LookoutConfig::default();
        cli.serve.apply(&mut config);

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_clients, 2);
        assert_eq!(config.detection.backend, DetectorKind::Tract);
        assert_eq!(
            config.detection.model_path,
            Some(PathBuf::from("/models/yolo.onnx"))
        );
        assert_eq!(config.detection.confidence, 0.6);
        assert!(!config.detection.enabled);
    }

    #[test]
    fn unknown_detector_is_rejected_by_parser() {
        assert!(TestCli::try_parse_from(["test", "--detector", "cuda"]).is_err());
    }

    #[test]
    fn stub_setup_builds_and_creates_recordings_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = LookoutConfig::default();
        config.recording.dir = temp_dir.path().join("uploads");

        let server = build_server(&config).unwrap();
        assert!(config.recording.dir.is_dir());
        assert_eq!(server.config().max_clients, 5);
    }

    #[test]
    fn tract_without_model_aborts_startup() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = LookoutConfig::default();
        config.recording.dir = temp_dir.path().to_path_buf();
        config.detection.backend = DetectorKind::Tract;

        assert!(build_server(&config).is_err());
    }
}
