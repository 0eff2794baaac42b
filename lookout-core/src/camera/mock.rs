use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};

use crate::config::CameraConfig;
use crate::error::CameraError;

use super::Camera;

#[derive(Default)]
struct ProbeState {
    open_attempts: AtomicUsize,
    closes: AtomicUsize,
    reads: AtomicUsize,
    is_open: AtomicBool,
    fail_open: AtomicBool,
    fail_read: AtomicBool,
    read_delay_ms: AtomicU64,
}

/// Observes and steers a [`MockCamera`] after it has been handed to a
/// frame source.
#[derive(Clone, Default)]
pub struct MockCameraProbe {
    state: Arc<ProbeState>,
}

impl MockCameraProbe {
    pub fn open_attempts(&self) -> usize {
        self.state.open_attempts.load(Ordering::SeqCst)
    }

    /// Number of times an open device was released.
    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.state.reads.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open.load(Ordering::SeqCst)
    }

    /// Make subsequent opens fail, as if the device were unplugged.
    pub fn set_fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_read(&self, fail: bool) {
        self.state.fail_read.store(fail, Ordering::SeqCst);
    }

    /// Make every read block for `delay`, like a stalled device.
    pub fn set_read_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.read_delay_ms.store(millis, Ordering::SeqCst);
    }
}

/// In-memory camera producing flat grey frames.
pub struct MockCamera {
    probe: MockCameraProbe,
    size: (u32, u32),
}

impl MockCamera {
    pub fn new() -> Self {
        Self {
            probe: MockCameraProbe::default(),
            size: (0, 0),
        }
    }

    pub fn probe(&self) -> MockCameraProbe {
        self.probe.clone()
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera for MockCamera {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn open(&mut self, config: &CameraConfig) -> Result<(), CameraError> {
        let state = &self.probe.state;
        state.open_attempts.fetch_add(1, Ordering::SeqCst);
        if state.fail_open.load(Ordering::SeqCst) {
            return Err(CameraError::Open {
                device: config.device.clone(),
                reason: "mock device unavailable".to_string(),
            });
        }
        self.size = (config.width, config.height);
        state.is_open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self) -> Result<RgbImage, CameraError> {
        let state = &self.probe.state;
        if !state.is_open.load(Ordering::SeqCst) {
            return Err(CameraError::NotOpen);
        }
        state.reads.fetch_add(1, Ordering::SeqCst);
        let delay = state.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if state.fail_read.load(Ordering::SeqCst) {
            return Err(CameraError::Read("mock read failure".to_string()));
        }
        let (width, height) = self.size;
        Ok(RgbImage::from_pixel(width, height, Rgb([128, 128, 128])))
    }

    fn close(&mut self) {
        let state = &self.probe.state;
        if state.is_open.swap(false, Ordering::SeqCst) {
            state.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_open(&self) -> bool {
        self.probe.is_open()
    }
}
