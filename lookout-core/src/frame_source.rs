//! The shared camera, detector and recorder behind one lifecycle.
//!
//! `FrameSource` is not internally synchronized. The server holds it behind a
//! mutex and only touches it from blocking threads, since reads, inference
//! and JPEG encoding all block. The detection flag is the exception: it is
//! shared through [`FrameSource::detection_switch`] so it can be read and
//! flipped while a capture holds the lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::RgbImage;
use tracing::{debug, info, instrument, warn};

use crate::camera::Camera;
use crate::config::{CameraConfig, DetectionConfig};
use crate::detect::{self, Detector};
use crate::error::{CameraError, RecordingError};
use crate::overlay;
use crate::recording::AviWriter;

/// One captured frame with overlays drawn.
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub image: RgbImage,
    /// Accepted detections; always zero while detection is disabled.
    pub detections: usize,
}

pub struct FrameSource {
    camera: Box<dyn Camera>,
    detector: Box<dyn Detector>,
    camera_config: CameraConfig,
    threshold: f32,
    target_class: usize,
    label: String,
    detection_enabled: Arc<AtomicBool>,
    recording: Option<AviWriter>,
}

impl FrameSource {
    pub fn new(
        camera: Box<dyn Camera>,
        detector: Box<dyn Detector>,
        camera_config: CameraConfig,
        detection: &DetectionConfig,
    ) -> Self {
        Self {
            camera,
            detector,
            camera_config,
            threshold: detection.confidence,
            target_class: detection.target_class,
            label: detection.target_label.clone(),
            detection_enabled: Arc::new(AtomicBool::new(detection.enabled)),
            recording: None,
        }
    }

    /// Open the camera. No-op if already open.
    #[instrument(name = "frame_source::start", skip(self), fields(device = %self.camera_config.device))]
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.camera.is_open() {
            debug!("Camera already running");
            return Ok(());
        }
        self.camera.open(&self.camera_config)?;
        info!("Camera started ({})", self.camera.name());
        Ok(())
    }

    /// Release the camera and finalize any recording. No-op if stopped.
    #[instrument(name = "frame_source::stop", skip(self))]
    pub fn stop(&mut self) {
        if let Err(e) = self.stop_recording() {
            warn!("Failed to finalize recording on camera stop: {}", e);
        }
        if self.camera.is_open() {
            self.camera.close();
            info!("Camera stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.camera.is_open()
    }

    /// Read, detect, annotate and (when recording) persist the next frame.
    ///
    /// Returns `None` when the camera is closed or a read or inference step
    /// fails; the condition is logged and the next call simply tries again.
    pub fn capture_annotated(&mut self) -> Option<AnnotatedFrame> {
        if !self.camera.is_open() {
            return None;
        }

        let mut image = match self.camera.read() {
            Ok(image) => image,
            Err(e) => {
                warn!("Failed to read frame: {}", e);
                return None;
            }
        };

        let enabled = self.detection_enabled();
        let mut count = 0;
        if enabled {
            let raw = match self.detector.detect(&image) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Detection failed: {}", e);
                    return None;
                }
            };
            let accepted = detect::accept(raw, self.threshold, self.target_class);
            count = accepted.len();
            overlay::annotate_detections(&mut image, &accepted, &self.label);
        }
        overlay::draw_status(&mut image, enabled, count);

        if let Some(writer) = self.recording.as_mut()
            && let Err(e) = writer.write_frame(&image)
        {
            warn!("Failed to append frame to recording: {}", e);
        }

        Some(AnnotatedFrame {
            image,
            detections: count,
        })
    }

    pub fn set_detection_enabled(&self, enabled: bool) {
        info!("Detection toggled: {}", enabled);
        self.detection_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn detection_enabled(&self) -> bool {
        self.detection_enabled.load(Ordering::SeqCst)
    }

    /// Handle to the detection flag that does not need the source itself.
    /// Captures read it once, before inference.
    pub fn detection_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.detection_enabled)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Begin recording to `path`.
    ///
    /// Returns `Ok(false)` without touching the filesystem if a recording is
    /// already in progress.
    pub fn start_recording(&mut self, path: &Path) -> Result<bool, RecordingError> {
        if self.recording.is_some() {
            debug!("Recording already in progress");
            return Ok(false);
        }
        let writer = AviWriter::create(
            path,
            self.camera_config.width,
            self.camera_config.height,
            self.camera_config.fps,
        )?;
        info!("Recording started: {}", path.display());
        self.recording = Some(writer);
        Ok(true)
    }

    /// Finalize the current recording, returning its path, or `None` if
    /// nothing was being recorded.
    pub fn stop_recording(&mut self) -> Result<Option<PathBuf>, RecordingError> {
        let Some(writer) = self.recording.take() else {
            return Ok(None);
        };
        let frames = writer.frame_count();
        let path = writer.finish()?;
        info!("Recording stopped: {} ({} frames)", path.display(), frames);
        Ok(Some(path))
    }
}
