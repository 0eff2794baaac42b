use image::RgbImage;

use crate::detect::{BoundingBox, Detection, Detector};
use crate::error::DetectError;

/// Channel level above which a pixel counts as "bright".
const BRIGHT_LEVEL: u8 = 250;

/// Model-free backend for demos and the synthetic camera.
///
/// Reports one detection covering every near-white pixel in the frame, with
/// a fixed confidence. Finds the synthetic camera's moving block.
pub struct StubDetector {
    class_id: usize,
}

impl StubDetector {
    pub const CONFIDENCE: f32 = 0.9;

    pub fn new(class_id: usize) -> Self {
        Self { class_id }
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, DetectError> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;

        for (x, y, pixel) in image.enumerate_pixels() {
            if pixel.0.iter().all(|&c| c >= BRIGHT_LEVEL) {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x1, y1, x2, y2)) => (x1.min(x), y1.min(y), x2.max(x), y2.max(y)),
                });
            }
        }

        Ok(bounds
            .map(|(x1, y1, x2, y2)| {
                Detection::new(
                    BoundingBox::new(x1 as f32, y1 as f32, (x2 + 1) as f32, (y2 + 1) as f32),
                    Self::CONFIDENCE,
                    self.class_id,
                )
            })
            .into_iter()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn dark_frame_has_no_detections() {
        let image = RgbImage::from_pixel(32, 32, Rgb([10, 10, 10]));
        assert!(StubDetector::default().detect(&image).unwrap().is_empty());
    }

    #[test]
    fn bright_block_is_boxed() {
        let mut image = RgbImage::from_pixel(32, 32, Rgb([10, 10, 10]));
        for y in 4..8 {
            for x in 10..20 {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }

        let detections = StubDetector::new(3).detect(&image).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox, BoundingBox::new(10.0, 4.0, 20.0, 8.0));
        assert_eq!(detections[0].class_id, 3);
    }
}
