//! Aspect-preserving resize into a square network input

use crate::error::VisionError;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Grey used by YOLOv8 for the padding bars.
const PAD_VALUE: u8 = 114;

/// Geometry of one letterbox transform, used to map boxes back to frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub input_size: u32,
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    pub fn new(frame_width: u32, frame_height: u32, input_size: u32) -> Result<Self, VisionError> {
        if frame_width == 0 || frame_height == 0 || input_size == 0 {
            return Err(VisionError::Processing(format!(
                "cannot letterbox {}x{} into {}",
                frame_width, frame_height, input_size
            )));
        }
        let scale =
            (input_size as f32 / frame_width as f32).min(input_size as f32 / frame_height as f32);
        let (w, h) = scaled_dims(frame_width, frame_height, scale);
        Ok(Self {
            input_size,
            scale,
            pad_x: (input_size - w) as f32 / 2.0,
            pad_y: (input_size - h) as f32 / 2.0,
        })
    }

    /// Map a point from network input space back to frame space.
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }

    /// Resize and pad `image`, then lay it out as a normalized CHW float tensor.
    pub fn tensor(&self, image: &RgbImage) -> Vec<f32> {
        let (w, h) = scaled_dims(image.width(), image.height(), self.scale);
        let resized = imageops::resize(image, w, h, FilterType::Triangle);

        let size = self.input_size;
        let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
        imageops::replace(&mut canvas, &resized, self.pad_x as i64, self.pad_y as i64);

        let plane = (size * size) as usize;
        let mut data = vec![0.0f32; plane * 3];
        for (x, y, px) in canvas.enumerate_pixels() {
            let idx = (y * size + x) as usize;
            data[idx] = px[0] as f32 / 255.0;
            data[plane + idx] = px[1] as f32 / 255.0;
            data[2 * plane + idx] = px[2] as f32 / 255.0;
        }
        data
    }
}

fn scaled_dims(width: u32, height: u32, scale: f32) -> (u32, u32) {
    (
        ((width as f32 * scale).round() as u32).max(1),
        ((height as f32 * scale).round() as u32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterbox_geometry_landscape() {
        let lb = Letterbox::new(640, 480, 640).unwrap();
        assert_eq!(lb.scale, 1.0);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 80.0);
        assert_eq!(lb.to_frame(100.0, 180.0), (100.0, 100.0));
    }

    #[test]
    fn test_letterbox_downscale() {
        let lb = Letterbox::new(1280, 720, 640).unwrap();
        assert_eq!(lb.scale, 0.5);
        assert_eq!(lb.pad_y, 140.0);
        let (x, y) = lb.to_frame(320.0, 320.0);
        assert_eq!((x, y), (640.0, 360.0));
    }

    #[test]
    fn test_letterbox_rejects_empty() {
        assert!(Letterbox::new(0, 480, 640).is_err());
    }

    #[test]
    fn test_tensor_layout_and_padding() {
        let image = RgbImage::from_pixel(4, 2, Rgb([255, 0, 0]));
        let lb = Letterbox::new(4, 2, 4).unwrap();
        let t = lb.tensor(&image);
        assert_eq!(t.len(), 3 * 16);
        // row 0 is padding, row 1 is image
        assert!((t[0] - 114.0 / 255.0).abs() < 1e-6);
        assert!((t[4] - 1.0).abs() < 1e-6);
        assert_eq!(t[16 + 4], 0.0);
    }
}
