use std::sync::{Arc, Mutex};

use image::RgbImage;

use crate::detect::{Detection, Detector};
use crate::error::DetectError;

/// Scripted backend for tests.
///
/// Returns whatever detections were last scripted, on every call. Clones
/// share the script, so a test can keep one copy and hand the other to a
/// frame source.
#[derive(Clone, Default)]
pub struct MockDetector {
    script: Arc<Mutex<Vec<Detection>>>,
}

impl MockDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detections(detections: Vec<Detection>) -> Self {
        let detector = Self::new();
        detector.set_detections(detections);
        detector
    }

    pub fn set_detections(&self, detections: Vec<Detection>) {
        let mut script = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *script = detections;
    }
}

impl Detector for MockDetector {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<Detection>, DetectError> {
        let script = self
            .script
            .lock()
            .map_err(|_| DetectError::Inference("mock script lock poisoned".to_string()))?;
        Ok(script.clone())
    }
}
