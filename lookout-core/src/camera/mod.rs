//! Camera backends.
//!
//! - `stub://...` synthetic test pattern (always available)
//! - `/dev/videoN` devices through libv4l (feature: camera-v4l2)
//! - [`MockCamera`] with an observable probe, for lifecycle tests
//!
//! A backend is constructed once at startup and then opened and closed as
//! viewers come and go. Opening may fail; callers treat that as a degraded
//! state, not a fatal one.

mod mock;
mod synthetic;
#[cfg(feature = "camera-v4l2")]
mod v4l2;

use image::RgbImage;

use crate::config::CameraConfig;
use crate::error::CameraError;

pub use mock::{MockCamera, MockCameraProbe};
pub use synthetic::SyntheticCamera;
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Camera;

/// A capture device that yields RGB frames.
pub trait Camera: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Open the device at the requested resolution and rate.
    ///
    /// Backends may negotiate a different resolution; frames report their
    /// actual size.
    fn open(&mut self, config: &CameraConfig) -> Result<(), CameraError>;

    /// Read the next frame. Fails with [`CameraError::NotOpen`] when closed.
    fn read(&mut self) -> Result<RgbImage, CameraError>;

    /// Release the device. Safe to call when already closed.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Construct the backend for a device path without opening it.
pub fn for_device(device: &str) -> Result<Box<dyn Camera>, CameraError> {
    if device.starts_with("stub://") {
        return Ok(Box::new(SyntheticCamera::new()));
    }

    #[cfg(feature = "camera-v4l2")]
    return Ok(Box::new(V4l2Camera::new(device)));

    #[cfg(not(feature = "camera-v4l2"))]
    return Err(CameraError::Unsupported(device.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_device_selects_synthetic_backend() {
        let camera = for_device("stub://test").unwrap();
        assert_eq!(camera.name(), "synthetic");
        assert!(!camera.is_open());
    }

    #[cfg(not(feature = "camera-v4l2"))]
    #[test]
    fn device_path_without_v4l2_is_unsupported() {
        assert!(matches!(
            for_device("/dev/video0"),
            Err(CameraError::Unsupported(_))
        ));
    }
}
