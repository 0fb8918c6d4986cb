//! Camera sources

use crate::error::VisionError;
use climasight_core::{Camera, Frame, Result};
use image::{Rgb, RgbImage};
use tracing::info;

/// Deterministic frame generator for simulation and tests.
///
/// Draws a gradient background with a bright square sweeping across it, so consecutive
/// frames differ and dashboards have something to show.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    tick: u64,
    started: bool,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, tick: 0, started: false }
    }

    pub fn frames_generated(&self) -> u64 {
        self.tick
    }

    fn render(&self) -> RgbImage {
        let (w, h) = (self.width, self.height);
        let side = (w.min(h) / 6).max(1);
        let offset = ((self.tick * 4) % w.max(1) as u64) as u32;
        let top = h.saturating_sub(side) / 2;
        RgbImage::from_fn(w, h, |x, y| {
            if x >= offset && x < offset + side && y >= top && y < top + side {
                Rgb([240, 240, 240])
            } else {
                Rgb([(x * 255 / w.max(1)) as u8, (y * 255 / h.max(1)) as u8, 64])
            }
        })
    }
}

impl Camera for SyntheticCamera {
    fn start(&mut self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            let msg = "synthetic camera needs a non-zero size".to_string();
            return Err(VisionError::Camera(msg).into());
        }
        self.started = true;
        info!("Synthetic camera started at {}x{}", self.width, self.height);
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame> {
        if !self.started {
            return Err(VisionError::Camera("camera not started".to_string()).into());
        }
        let frame = Frame::new(self.render());
        self.tick += 1;
        Ok(frame)
    }

    fn stop(&mut self) {
        if self.started {
            info!("Synthetic camera stopped after {} frames", self.tick);
        }
        self.started = false;
    }
}

#[cfg(feature = "opencv")]
pub use opencv_camera::OpenCvCamera;

#[cfg(feature = "opencv")]
mod opencv_camera {
    use crate::error::VisionError;
    use climasight_core::{Camera, CameraConfig, Frame, Result};
    use opencv::{
        core::Mat,
        imgproc,
        prelude::*,
        videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
    };
    use tracing::info;

    /// USB / V4L2 camera through OpenCV `VideoCapture`.
    pub struct OpenCvCamera {
        config: CameraConfig,
        capture: Option<VideoCapture>,
    }

    impl OpenCvCamera {
        pub fn new(config: CameraConfig) -> Self {
            Self { config, capture: None }
        }

        fn open(&self) -> std::result::Result<VideoCapture, VisionError> {
            let id = self.config.camera_id;
            let mut capture = VideoCapture::new(id as i32, CAP_ANY)
                .map_err(|e| VisionError::Camera(format!("Failed to open camera {}: {}", id, e)))?;
            if !capture.is_opened()? {
                return Err(VisionError::Camera(format!("Camera {} failed to open", id)));
            }
            capture.set(CAP_PROP_FRAME_WIDTH, self.config.width as f64)?;
            capture.set(CAP_PROP_FRAME_HEIGHT, self.config.height as f64)?;
            capture.set(CAP_PROP_FPS, self.config.target_fps as f64)?;
            Ok(capture)
        }

        fn grab(&mut self) -> std::result::Result<Frame, VisionError> {
            let capture = self
                .capture
                .as_mut()
                .ok_or_else(|| VisionError::Camera("camera not started".to_string()))?;
            let mut bgr = Mat::default();
            if !capture.read(&mut bgr)? || bgr.empty() {
                return Err(VisionError::Camera("empty frame".to_string()));
            }
            let mut rgb = Mat::default();
            imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
            let (cols, rows) = (rgb.cols() as u32, rgb.rows() as u32);
            let bytes = if rgb.is_continuous() {
                rgb.data_bytes()?.to_vec()
            } else {
                rgb.try_clone()?.data_bytes()?.to_vec()
            };
            Frame::from_rgb(cols, rows, bytes)
                .ok_or_else(|| {
                    VisionError::Camera(format!("unexpected frame layout {}x{}", cols, rows))
                })
        }
    }

    impl Camera for OpenCvCamera {
        fn start(&mut self) -> Result<()> {
            if self.capture.is_none() {
                self.capture = Some(self.open()?);
                info!(
                    "Camera {} initialized at {}x{} @ {}fps",
                    self.config.camera_id,
                    self.config.width,
                    self.config.height,
                    self.config.target_fps
                );
            }
            Ok(())
        }

        fn capture(&mut self) -> Result<Frame> {
            Ok(self.grab()?)
        }

        fn stop(&mut self) {
            if let Some(mut capture) = self.capture.take() {
                let _ = capture.release();
                info!("Camera {} released", self.config.camera_id);
            }
        }
    }

    impl Drop for OpenCvCamera {
        fn drop(&mut self) {
            self.stop();
        }
    }
}
