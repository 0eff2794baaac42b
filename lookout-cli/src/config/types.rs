use std::path::PathBuf;

use anyhow::{Result, bail};
use lookout_core::{CameraConfig, DetectionConfig, DetectorKind};
use serde::{Deserialize, Serialize};

/// Default host for the lookout server
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default port for the lookout server
pub const DEFAULT_PORT: u16 = 5000;
/// Default viewer limit
pub const DEFAULT_MAX_CLIENTS: usize = 5;
/// Default recordings directory, relative to the working directory
pub const DEFAULT_RECORDINGS_DIR: &str = "static/uploads";

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawLookoutConfig {
    #[serde(default)]
    pub server: RawServerConfig,

    #[serde(default)]
    pub camera: RawCameraConfig,

    #[serde(default)]
    pub detection: RawDetectionConfig,

    #[serde(default)]
    pub broadcast: RawBroadcastConfig,

    #[serde(default)]
    pub recording: RawRecordingConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_clients: Option<usize>,
    pub cors_origins: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawCameraConfig {
    pub device: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDetectionConfig {
    pub backend: Option<DetectorKind>,
    pub model_path: Option<PathBuf>,
    pub confidence: Option<f32>,
    pub target_class: Option<usize>,
    pub target_label: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawBroadcastConfig {
    pub fps: Option<u32>,
    pub jpeg_quality: Option<u8>,
    pub frame_budget_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRecordingConfig {
    pub dir: Option<PathBuf>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LookoutConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub broadcast: BroadcastSection,

    #[serde(default)]
    pub recording: RecordingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Viewers allowed at once
    pub max_clients: usize,
    /// Allowed CORS origins; `*` allows all
    pub cors_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            cors_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastSection {
    /// Broadcast cycles per second
    pub fps: u32,
    pub jpeg_quality: u8,
    /// Longest one capture may take before the cycle is failed
    pub frame_budget_ms: u64,
}

impl Default for BroadcastSection {
    fn default() -> Self {
        let defaults = lookout_server::BroadcastConfig::default();
        Self {
            fps: defaults.fps,
            jpeg_quality: defaults.jpeg_quality,
            frame_budget_ms: defaults.frame_budget_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSection {
    pub dir: PathBuf,
}

impl Default for RecordingSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_RECORDINGS_DIR),
        }
    }
}

impl LookoutConfig {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_clients == 0 {
            bail!("server.max_clients must be at least 1");
        }
        if !(1..=100).contains(&self.broadcast.jpeg_quality) {
            bail!(
                "broadcast.jpeg_quality must be between 1 and 100, got {}",
                self.broadcast.jpeg_quality
            );
        }
        if self.broadcast.fps == 0 || self.camera.fps == 0 {
            bail!("camera.fps and broadcast.fps must be positive");
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            bail!(
                "camera resolution must be non-zero, got {}x{}",
                self.camera.width,
                self.camera.height
            );
        }
        if !(0.0..1.0).contains(&self.detection.confidence) {
            bail!(
                "detection.confidence must be in [0, 1), got {}",
                self.detection.confidence
            );
        }
        Ok(())
    }

    pub fn to_server_config(&self) -> lookout_server::ServerConfig {
        lookout_server::ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            max_clients: self.server.max_clients,
            cors_origins: self.server.cors_origins.clone(),
            broadcast: lookout_server::BroadcastConfig {
                fps: self.broadcast.fps,
                jpeg_quality: self.broadcast.jpeg_quality,
                frame_budget_ms: self.broadcast.frame_budget_ms,
            },
            recordings_dir: self.recording.dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = LookoutConfig::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.max_clients, 5);
        assert_eq!(config.camera.device, "stub://");
        assert_eq!(config.detection.confidence, 0.5);
        assert_eq!(config.broadcast.jpeg_quality, 80);
        assert_eq!(config.recording.dir, PathBuf::from("static/uploads"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = LookoutConfig::default();
        config.server.port = 8080;
        config.detection.backend = DetectorKind::Tract;
        config.detection.model_path = Some(PathBuf::from("/models/yolov8n.onnx"));

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: LookoutConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.detection.backend, DetectorKind::Tract);
        assert_eq!(
            parsed.detection.model_path,
            Some(PathBuf::from("/models/yolov8n.onnx"))
        );
    }

    #[test]
    fn test_raw_config_partial_parsing() {
        let toml_str = r#"
[server]
port = 9000

[detection]
backend = "tract"
"#;
        let raw: RawLookoutConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(raw.server.port, Some(9000));
        assert!(raw.server.host.is_none());
        assert_eq!(raw.detection.backend, Some(DetectorKind::Tract));
        assert!(raw.detection.confidence.is_none());
        assert!(raw.camera.device.is_none());
    }

    #[test]
    fn test_raw_config_empty_uses_none() {
        let raw: RawLookoutConfig = toml::from_str("").unwrap();
        assert!(raw.server.port.is_none());
        assert!(raw.broadcast.fps.is_none());
        assert!(raw.recording.dir.is_none());
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        let result = toml::from_str::<RawLookoutConfig>("[detection]\nbackend = \"cuda\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = LookoutConfig::default();
        config.server.max_clients = 0;
        assert!(config.validate().is_err());

        let mut config = LookoutConfig::default();
        config.broadcast.jpeg_quality = 0;
        assert!(config.validate().is_err());

        let mut config = LookoutConfig::default();
        config.detection.confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn server_config_carries_every_section() {
        let mut config = LookoutConfig::default();
        config.server.max_clients = 2;
        config.broadcast.fps = 15;
        config.recording.dir = PathBuf::from("/tmp/rec");

        let server = config.to_server_config();
        assert_eq!(server.max_clients, 2);
        assert_eq!(server.broadcast.fps, 15);
        assert_eq!(server.recordings_dir, PathBuf::from("/tmp/rec"));
        assert_eq!(server.addr(), "0.0.0.0:5000");
    }
}
