//! Capture and detection settings
//!
//! These are the finalized values handed to [`crate::FrameSource`]. Layered
//! loading from TOML lives in the CLI.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DetectError;

/// Default device path: the built-in synthetic test pattern
pub const DEFAULT_DEVICE: &str = "stub://";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device path (`stub://...` or `/dev/videoN`)
    pub device: String,
    /// Requested frame width
    pub width: u32,
    /// Requested frame height
    pub height: u32,
    /// Requested capture rate
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

/// Which detector implementation to load at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Bright-region detector, needs no model file
    #[default]
    Stub,
    /// YOLO-style ONNX model run through tract
    Tract,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Stub => "stub",
            DetectorKind::Tract => "tract",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorKind {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stub" => Ok(DetectorKind::Stub),
            "tract" => Ok(DetectorKind::Tract),
            other => Err(DetectError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub backend: DetectorKind,
    /// Model file for backends that need one
    pub model_path: Option<PathBuf>,
    /// Detections must score strictly above this to be drawn and counted
    pub confidence: f32,
    /// Model class index to keep; everything else is discarded
    pub target_class: usize,
    /// Label drawn next to each accepted box
    pub target_label: String,
    /// Whether detection starts enabled
    pub enabled: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            backend: DetectorKind::Stub,
            model_path: None,
            confidence: 0.5,
            target_class: 0,
            target_label: "Person".to_string(),
            enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_settings() {
        let camera = CameraConfig::default();
        assert_eq!((camera.width, camera.height, camera.fps), (640, 480, 30));

        let detection = DetectionConfig::default();
        assert_eq!(detection.confidence, 0.5);
        assert_eq!(detection.target_class, 0);
        assert!(detection.enabled);
    }

    #[test]
    fn detector_kind_parses_case_insensitively() {
        assert_eq!("Tract".parse::<DetectorKind>().unwrap(), DetectorKind::Tract);
        assert_eq!("stub".parse::<DetectorKind>().unwrap(), DetectorKind::Stub);
        assert!("yolo".parse::<DetectorKind>().is_err());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: DetectionConfig = serde_json::from_str(r#"{"confidence": 0.7}"#).unwrap();
        assert_eq!(config.confidence, 0.7);
        assert_eq!(config.backend, DetectorKind::Stub);
        assert_eq!(config.target_label, "Person");
    }
}
