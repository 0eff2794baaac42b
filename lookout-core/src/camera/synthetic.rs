use image::{Rgb, RgbImage};
use tracing::info;

use crate::config::CameraConfig;
use crate::error::CameraError;

use super::Camera;

/// Side length of the moving block, as a fraction of frame height.
const BLOCK_FRACTION: u32 = 4;

/// Synthetic camera for `stub://` devices.
///
/// Renders a dim gradient with a bright block sweeping left to right, which
/// gives the stub detector something to find.
pub struct SyntheticCamera {
    size: Option<(u32, u32)>,
    frame_count: u64,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self {
            size: None,
            frame_count: 0,
        }
    }

    fn render(&self, width: u32, height: u32) -> RgbImage {
        let block = (height / BLOCK_FRACTION).max(1);
        let travel = width.saturating_sub(block).max(1) as u64;
        let block_x = ((self.frame_count * 4) % travel) as u32;
        let block_y = height.saturating_sub(block) / 2;

        RgbImage::from_fn(width, height, |x, y| {
            let in_block =
                x >= block_x && x < block_x + block && y >= block_y && y < block_y + block;
            if in_block {
                Rgb([255, 255, 255])
            } else {
                let shade = ((x + y) % 96) as u8 + 32;
                Rgb([shade / 2, shade / 2, shade])
            }
        })
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera for SyntheticCamera {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn open(&mut self, config: &CameraConfig) -> Result<(), CameraError> {
        if config.width == 0 || config.height == 0 {
            return Err(CameraError::Open {
                device: config.device.clone(),
                reason: format!("invalid resolution {}x{}", config.width, config.height),
            });
        }
        self.size = Some((config.width, config.height));
        self.frame_count = 0;
        info!(
            "Synthetic camera opened at {}x{}",
            config.width, config.height
        );
        Ok(())
    }

    fn read(&mut self) -> Result<RgbImage, CameraError> {
        let (width, height) = self.size.ok_or(CameraError::NotOpen)?;
        let frame = self.render(width, height);
        self.frame_count += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        self.size = None;
    }

    fn is_open(&self) -> bool {
        self.size.is_some()
    }
}
