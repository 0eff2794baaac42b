//! Error types for lookout-core

use std::path::PathBuf;

use thiserror::Error;

/// Errors from camera backends
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera {device}: {reason}")]
    Open { device: String, reason: String },

    #[error("Camera is not open")]
    NotOpen,

    #[error("Failed to read frame: {0}")]
    Read(String),

    #[error("No camera backend for device {0} in this build")]
    Unsupported(String),
}

/// Errors from detection backends
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Failed to load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Detector backend {0} requires a model_path")]
    MissingModel(String),

    #[error("Detector backend {0} is not compiled into this build")]
    BackendUnavailable(String),

    #[error("Unknown detector backend: {0}")]
    UnknownBackend(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Errors while encoding or decoding still frames
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JPEG encoding failed: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Image decoding failed: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Not an image data URI")]
    InvalidDataUri,

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Errors from the recording sink
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Recording I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode recorded frame: {0}")]
    Codec(#[from] CodecError),

    #[error("Recording exceeds the 4 GiB AVI limit")]
    TooLarge,

    #[error("Recording stopped accepting frames after a failed write")]
    Interrupted,
}
