//! YOLO-style ONNX detector on tract.
//!
//! Expects a single-image model with input `1x3xSxS` (RGB, 0..1) and output
//! `1x(4+C)xN`, where each of the N columns holds `cx, cy, w, h` in input
//! pixels followed by one score per class. This is the layout exported by
//! YOLOv8.

use std::path::Path;

use image::RgbImage;
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::{BoundingBox, Detection, Detector};
use crate::error::DetectError;

/// Square input size the model is compiled for.
const INPUT_SIZE: u32 = 640;

/// Overlap above which the weaker of two boxes is suppressed.
const NMS_IOU: f32 = 0.45;

pub struct TractDetector {
    model: TypedRunnableModel<TypedModel>,
    confidence: f32,
    classes: Option<Vec<usize>>,
}

impl TractDetector {
    /// Load and optimize an ONNX model from disk.
    pub fn load<P: AsRef<Path>>(model_path: P, confidence: f32) -> Result<Self, DetectError> {
        let model_path = model_path.as_ref();
        let load_error = |reason: String| DetectError::ModelLoad {
            path: model_path.to_path_buf(),
            reason,
        };

        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|e| load_error(e.to_string()))?
            .with_input_fact(
                0,
                f32::fact([1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize]).into(),
            )
            .map_err(|e| load_error(format!("failed to set input fact: {e}")))?
            .into_optimized()
            .map_err(|e| load_error(format!("failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| load_error(format!("failed to build runnable model: {e}")))?;

        Ok(Self {
            model,
            confidence,
            classes: None,
        })
    }

    /// Restrict results to the given class indices.
    pub fn with_classes(mut self, classes: Vec<usize>) -> Self {
        self.classes = Some(classes);
        self
    }

    fn build_input(&self, image: &RgbImage) -> Tensor {
        let resized = imageops::resize(image, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        let size = INPUT_SIZE as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        })
        .into_tensor()
    }

    fn wants_class(&self, class_id: usize) -> bool {
        self.classes
            .as_ref()
            .is_none_or(|classes| classes.contains(&class_id))
    }
}

impl Detector for TractDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, DetectError> {
        let input = self.build_input(image);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| DetectError::Inference(e.to_string()))?;
        let output = outputs
            .first()
            .ok_or_else(|| DetectError::Inference("model produced no outputs".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| DetectError::Inference(e.to_string()))?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .map_err(|e| DetectError::Inference(format!("unexpected output shape: {e}")))?;

        let (_, rows, columns) = view.dim();
        if rows <= 4 {
            return Err(DetectError::Inference(format!(
                "output has {rows} rows, expected box plus class scores"
            )));
        }

        let scale_x = image.width() as f32 / INPUT_SIZE as f32;
        let scale_y = image.height() as f32 / INPUT_SIZE as f32;

        let mut candidates = Vec::new();
        for column in 0..columns {
            let (class_id, score) = (4..rows)
                .map(|row| (row - 4, view[[0, row, column]]))
                .filter(|(class_id, _)| self.wants_class(*class_id))
                .fold((0, f32::NEG_INFINITY), |best, item| {
                    if item.1 > best.1 { item } else { best }
                });
            if score <= self.confidence {
                continue;
            }

            let cx = view[[0, 0, column]];
            let cy = view[[0, 1, column]];
            let w = view[[0, 2, column]];
            let h = view[[0, 3, column]];
            let bbox = BoundingBox::new(
                (cx - w / 2.0) * scale_x,
                (cy - h / 2.0) * scale_y,
                (cx + w / 2.0) * scale_x,
                (cy + h / 2.0) * scale_y,
            );
            candidates.push(Detection::new(bbox, score, class_id));
        }

        Ok(non_max_suppression(candidates, NMS_IOU))
    }
}

/// Greedy per-class NMS, highest score first.
fn non_max_suppression(mut candidates: Vec<Detection>, iou: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        let overlaps = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}
