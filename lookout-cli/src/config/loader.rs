use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use lookout_core::{CameraConfig, DetectionConfig};

use super::types::{
    BroadcastSection, LookoutConfig, RawBroadcastConfig, RawCameraConfig, RawDetectionConfig,
    RawLookoutConfig, RawRecordingConfig, RawServerConfig, RecordingSection, ServerSection,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<LookoutConfig> {
        let mut layers = Vec::new();
        if let Some(user_path) = Self::user_config_path() {
            layers.push(user_path);
        }
        layers.push(Self::project_config_path());
        Self::load_from_paths(&layers)
    }

    /// Merge each existing file in order, later files winning
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<LookoutConfig> {
        let mut raw = RawLookoutConfig::default();
        for path in paths {
            if let Some(layer) = Self::read_raw(path)? {
                raw = Self::merge_raw(raw, layer);
            }
        }
        Ok(Self::finalize(raw))
    }

    fn read_raw(path: &Path) -> Result<Option<RawLookoutConfig>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let raw = toml::from_str(&contents)
            .with_context(|| format!("invalid config in {}", path.display()))?;
        tracing::debug!("Loaded config layer {}", path.display());
        Ok(Some(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "lookout").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with LOOKOUT_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("LOOKOUT_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".lookout/config.toml")
        }
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawLookoutConfig, overlay: RawLookoutConfig) -> RawLookoutConfig {
        RawLookoutConfig {
            server: RawServerConfig {
                host: overlay.server.host.or(base.server.host),
                port: overlay.server.port.or(base.server.port),
                max_clients: overlay.server.max_clients.or(base.server.max_clients),
                cors_origins: overlay.server.cors_origins.or(base.server.cors_origins),
            },
            camera: RawCameraConfig {
                device: overlay.camera.device.or(base.camera.device),
                width: overlay.camera.width.or(base.camera.width),
                height: overlay.camera.height.or(base.camera.height),
                fps: overlay.camera.fps.or(base.camera.fps),
            },
            detection: RawDetectionConfig {
                backend: overlay.detection.backend.or(base.detection.backend),
                model_path: overlay.detection.model_path.or(base.detection.model_path),
                confidence: overlay.detection.confidence.or(base.detection.confidence),
                target_class: overlay.detection.target_class.or(base.detection.target_class),
                target_label: overlay.detection.target_label.or(base.detection.target_label),
                enabled: overlay.detection.enabled.or(base.detection.enabled),
            },
            broadcast: RawBroadcastConfig {
                fps: overlay.broadcast.fps.or(base.broadcast.fps),
                jpeg_quality: overlay.broadcast.jpeg_quality.or(base.broadcast.jpeg_quality),
                frame_budget_ms: overlay
                    .broadcast
                    .frame_budget_ms
                    .or(base.broadcast.frame_budget_ms),
            },
            recording: RawRecordingConfig {
                dir: overlay.recording.dir.or(base.recording.dir),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawLookoutConfig) -> LookoutConfig {
        let server = ServerSection::default();
        let camera = CameraConfig::default();
        let detection = DetectionConfig::default();
        let broadcast = BroadcastSection::default();
        let recording = RecordingSection::default();

        LookoutConfig {
            server: ServerSection {
                host: raw.server.host.unwrap_or(server.host),
                port: raw.server.port.unwrap_or(server.port),
                max_clients: raw.server.max_clients.unwrap_or(server.max_clients),
                cors_origins: raw.server.cors_origins.unwrap_or(server.cors_origins),
            },
            camera: CameraConfig {
                device: raw.camera.device.unwrap_or(camera.device),
                width: raw.camera.width.unwrap_or(camera.width),
                height: raw.camera.height.unwrap_or(camera.height),
                fps: raw.camera.fps.unwrap_or(camera.fps),
            },
            detection: DetectionConfig {
                backend: raw.detection.backend.unwrap_or(detection.backend),
                model_path: raw.detection.model_path.or(detection.model_path),
                confidence: raw.detection.confidence.unwrap_or(detection.confidence),
                target_class: raw.detection.target_class.unwrap_or(detection.target_class),
                target_label: raw.detection.target_label.unwrap_or(detection.target_label),
                enabled: raw.detection.enabled.unwrap_or(detection.enabled),
            },
            broadcast: BroadcastSection {
                fps: raw.broadcast.fps.unwrap_or(broadcast.fps),
                jpeg_quality: raw.broadcast.jpeg_quality.unwrap_or(broadcast.jpeg_quality),
                frame_budget_ms: raw
                    .broadcast
                    .frame_budget_ms
                    .unwrap_or(broadcast.frame_budget_ms),
            },
            recording: RecordingSection {
                dir: raw.recording.dir.unwrap_or(recording.dir),
            },
        }
    }
}
