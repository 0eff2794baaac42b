//! Object detection behind a narrow interface.
//!
//! A [`Detector`] turns an RGB frame into a list of scored boxes. Which
//! detections are drawn and counted is decided here by [`accept`], not by the
//! backend: only the target class is kept, and only scores strictly greater
//! than the threshold pass.

mod backends;

use image::RgbImage;

use crate::config::{DetectionConfig, DetectorKind};
use crate::error::DetectError;

pub use backends::{MockDetector, StubDetector};
#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;

/// Box corners in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32, class_id: usize) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
        }
    }
}

/// A pretrained detection model treated as a black box.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the model on a frame. Implementations must not retain the image.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, DetectError>;
}

/// Keep detections of `target_class` scoring strictly above `threshold`.
pub fn accept(detections: Vec<Detection>, threshold: f32, target_class: usize) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| d.class_id == target_class && d.confidence > threshold)
        .collect()
}

/// Load the configured detector.
///
/// Failure here is fatal for the server: there is no useful fallback when the
/// requested model cannot be loaded.
pub fn build_detector(config: &DetectionConfig) -> Result<Box<dyn Detector>, DetectError> {
    match config.backend {
        DetectorKind::Stub => Ok(Box::new(StubDetector::new(config.target_class))),
        DetectorKind::Tract => build_tract(config),
    }
}

#[cfg(feature = "backend-tract")]
fn build_tract(config: &DetectionConfig) -> Result<Box<dyn Detector>, DetectError> {
    let path = config
        .model_path
        .as_ref()
        .ok_or_else(|| DetectError::MissingModel("tract".to_string()))?;
    let detector =
        TractDetector::load(path, config.confidence)?.with_classes(vec![config.target_class]);
    Ok(Box::new(detector))
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract(_config: &DetectionConfig) -> Result<Box<dyn Detector>, DetectError> {
    Err(DetectError::BackendUnavailable("tract".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(confidence: f32, class_id: usize) -> Detection {
        Detection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), confidence, class_id)
    }

    #[test]
    fn threshold_is_strictly_greater_than() {
        let kept = accept(vec![det(0.5, 0), det(0.51, 0)], 0.5, 0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.51);
    }

    #[test]
    fn other_classes_are_discarded() {
        let kept = accept(vec![det(0.9, 2), det(0.9, 0)], 0.5, 0);
        assert_eq!(kept, vec![det(0.9, 0)]);
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn stub_backend_builds_without_model() {
        let detector = build_detector(&DetectionConfig::default()).unwrap();
        assert_eq!(detector.name(), "stub");
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn tract_backend_is_unavailable_without_feature() {
        let config = DetectionConfig {
            backend: DetectorKind::Tract,
            ..DetectionConfig::default()
        };
        assert!(matches!(
            build_detector(&config),
            Err(DetectError::BackendUnavailable(_))
        ));
    }
}
