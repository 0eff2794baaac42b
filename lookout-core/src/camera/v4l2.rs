//! V4L2 capture for local `/dev/videoN` devices.
//!
//! Frames are requested as packed RGB24 (`RGB3`). Devices that refuse the
//! format fall back to whatever they report, and reads fail if the buffer is
//! not a full RGB24 frame.

use image::RgbImage;
use ouroboros::self_referencing;
use tracing::{info, warn};

use crate::config::CameraConfig;
use crate::error::CameraError;

use super::Camera;

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

pub struct V4l2Camera {
    device_path: String,
    state: Option<DeviceState>,
    active_width: u32,
    active_height: u32,
}

impl V4l2Camera {
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
            state: None,
            active_width: 0,
            active_height: 0,
        }
    }

    fn open_error(&self, reason: impl ToString) -> CameraError {
        CameraError::Open {
            device: self.device_path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl Camera for V4l2Camera {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn open(&mut self, config: &CameraConfig) -> Result<(), CameraError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        if self.state.is_some() {
            return Ok(());
        }

        let mut device =
            v4l::Device::with_path(&self.device_path).map_err(|e| self.open_error(e))?;
        let mut format = device.format().map_err(|e| self.open_error(e))?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                warn!(
                    "V4L2: failed to set format on {}: {}",
                    self.device_path, err
                );
                device.format().map_err(|e| self.open_error(e))?
            }
        };

        if config.fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.fps);
            if let Err(err) = device.set_params(&params) {
                warn!("V4L2: failed to set fps on {}: {}", self.device_path, err);
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = DeviceStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
            },
        }
        .try_build()
        .map_err(|e| self.open_error(e))?;
        self.state = Some(state);

        info!(
            "V4L2: opened {} at {}x{}",
            self.device_path, self.active_width, self.active_height
        );
        Ok(())
    }

    fn read(&mut self) -> Result<RgbImage, CameraError> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().ok_or(CameraError::NotOpen)?;
        let buf = state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .map_err(|e| CameraError::Read(e.to_string()))?;

        RgbImage::from_raw(self.active_width, self.active_height, buf).ok_or_else(|| {
            CameraError::Read(format!(
                "buffer is not a {}x{} RGB24 frame",
                self.active_width, self.active_height
            ))
        })
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            info!("V4L2: released {}", self.device_path);
        }
    }

    fn is_open(&self) -> bool {
        self.state.is_some()
    }
}
