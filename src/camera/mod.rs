//! Webcam frame source.
//!
//! Synchronous capture through nokhwa: the device is opened once at startup
//! and the pipeline blocks on `read_frame` each loop iteration. A read
//! failure is fatal to the loop; the caller decides how to shut down.

use std::time::Instant;

use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use thiserror::Error;

/// Errors from the capture device.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to open camera {index}: {source}")]
    Open {
        index: u32,
        source: nokhwa::NokhwaError,
    },
    #[error("failed to open camera stream: {0}")]
    Stream(nokhwa::NokhwaError),
    #[error("failed to read frame: {0}")]
    Read(nokhwa::NokhwaError),
    #[error("failed to decode frame: {0}")]
    Decode(nokhwa::NokhwaError),
}

/// One captured frame, RGBA8.
#[derive(Clone)]
pub struct Frame {
    /// RGBA pixel data, row-major.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub frame_number: u64,
    pub timestamp: Instant,
}

impl Frame {
    /// Build a frame from raw RGBA bytes (tests and composition).
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), (width * height * 4) as usize);
        Self {
            data,
            width,
            height,
            frame_number: 0,
            timestamp: Instant::now(),
        }
    }

    /// Mirror the frame in place (selfie view).
    pub fn flip_horizontal(&mut self) {
        let row_bytes = (self.width * 4) as usize;
        for row in self.data.chunks_exact_mut(row_bytes) {
            let mut left = 0usize;
            let mut right = self.width as usize - 1;
            while left < right {
                for c in 0..4 {
                    row.swap(left * 4 + c, right * 4 + c);
                }
                left += 1;
                right -= 1;
            }
        }
    }
}

/// Synchronous camera wrapper.
pub struct FrameSource {
    camera: Camera,
    frame_count: u64,
}

impl FrameSource {
    /// Open a capture device, trying progressively looser format requests
    /// (some backends reject the first choice).
    pub fn open(index: u32) -> Result<Self, CaptureError> {
        let camera_index = CameraIndex::Index(index);

        let attempts = [
            RequestedFormatType::AbsoluteHighestResolution,
            RequestedFormatType::HighestResolution(Resolution::new(640, 480)),
            RequestedFormatType::None,
        ];

        let mut camera = None;
        let mut last_err = None;
        for (attempt, format_type) in attempts.into_iter().enumerate() {
            match Camera::new(
                camera_index.clone(),
                RequestedFormat::new::<RgbAFormat>(format_type),
            ) {
                Ok(c) => {
                    camera = Some(c);
                    break;
                }
                Err(e) => {
                    log::warn!("Camera format request {} failed: {:?}", attempt, e);
                    last_err = Some(e);
                }
            }
        }
        let Some(mut camera) = camera else {
            return Err(CaptureError::Open {
                index,
                source: last_err.unwrap_or(nokhwa::NokhwaError::GeneralError(
                    "no capture format accepted".into(),
                )),
            });
        };

        camera.open_stream().map_err(CaptureError::Stream)?;

        log::info!(
            "Camera opened: {} ({}x{})",
            camera.info().human_name(),
            camera.resolution().width(),
            camera.resolution().height()
        );

        Ok(Self {
            camera,
            frame_count: 0,
        })
    }

    /// Blocking read of the next frame.
    pub fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        let buffer = self.camera.frame().map_err(CaptureError::Read)?;
        let image = buffer
            .decode_image::<RgbAFormat>()
            .map_err(CaptureError::Decode)?;

        let frame_number = self.frame_count;
        self.frame_count += 1;

        Ok(Frame {
            width: buffer.resolution().width(),
            height: buffer.resolution().height(),
            data: image.into_raw(),
            frame_number,
            timestamp: Instant::now(),
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        let res = self.camera.resolution();
        (res.width(), res.height())
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("Failed to stop camera stream: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_horizontal_mirrors_rows() {
        // 3x2 frame with distinct red channels.
        let mut data = Vec::new();
        for v in [10u8, 20, 30, 40, 50, 60] {
            data.extend_from_slice(&[v, 0, 0, 255]);
        }
        let mut frame = Frame::from_rgba(3, 2, data);
        frame.flip_horizontal();

        let reds: Vec<u8> = frame.data.chunks_exact(4).map(|px| px[0]).collect();
        assert_eq!(reds, vec![30, 20, 10, 60, 50, 40]);
    }

    #[test]
    fn test_flip_twice_is_identity() {
        let data: Vec<u8> = (0..4 * 4 * 4).map(|i| i as u8).collect();
        let mut frame = Frame::from_rgba(4, 4, data.clone());
        frame.flip_horizontal();
        frame.flip_horizontal();
        assert_eq!(frame.data, data);
    }
}
