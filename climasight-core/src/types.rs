use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A captured camera frame, always in RGB channel order.
///
/// Frames are immutable once built; the shared state hands them out behind an `Arc`
/// so readers never observe a frame being written.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    sequence: u64,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            sequence: 0,
        }
    }

    /// Build a frame from a packed RGB8 buffer. Returns `None` when the buffer
    /// length does not match `width * height * 3`.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(Self::new)
    }

    /// Build a frame from a packed BGR8 buffer, swapping channels into RGB.
    pub fn from_bgr(width: u32, height: u32, mut data: Vec<u8>) -> Option<Self> {
        for px in data.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
        Self::from_rgb(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Publish order assigned by the shared state. Zero means never published.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }
}

/// Axis-aligned box in frame pixel coordinates, `(x1, y1)` top-left and `(x2, y2)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: u32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: u32) -> Self {
        Self { x1, y1, x2, y2, confidence, class_id }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box, 0.0 when disjoint.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Integer corners clamped into a `width` x `height` frame, for drawing.
    pub fn clamped_corners(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let clamp = |v: f32, max: u32| v.max(0.0).min(max.saturating_sub(1) as f32) as u32;
        (
            clamp(self.x1, width),
            clamp(self.y1, height),
            clamp(self.x2, width),
            clamp(self.y2, height),
        )
    }
}

/// Class restriction and confidence floor applied by every detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionFilter {
    pub class_id: u32,
    pub min_confidence: f32,
}

impl DetectionFilter {
    pub fn new(class_id: u32, min_confidence: f32) -> Self {
        Self { class_id, min_confidence }
    }

    pub fn accepts(&self, class_id: u32, confidence: f32) -> bool {
        class_id == self.class_id && confidence >= self.min_confidence
    }
}

impl Default for DetectionFilter {
    fn default() -> Self {
        // COCO class 0 is "person"
        Self { class_id: 0, min_confidence: 0.5 }
    }
}

/// Result of one detector pass over one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    boxes: Vec<BoundingBox>,
    frame_sequence: u64,
    inference_ms: f64,
}

impl Detection {
    pub fn new(boxes: Vec<BoundingBox>, frame_sequence: u64, inference_ms: f64) -> Self {
        Self { boxes, frame_sequence, inference_ms }
    }

    /// Sentinel returned before the first detection is published: zero boxes, sequence 0.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, 0.0)
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    /// Occupancy count, always equal to the number of boxes.
    pub fn count(&self) -> u32 {
        self.boxes.len() as u32
    }

    pub fn frame_sequence(&self) -> u64 {
        self.frame_sequence
    }

    pub fn inference_ms(&self) -> f64 {
        self.inference_ms
    }

    pub fn is_empty_sentinel(&self) -> bool {
        self.frame_sequence == 0 && self.boxes.is_empty()
    }
}

impl Default for Detection {
    fn default() -> Self {
        Self::empty()
    }
}

/// One successful environmental sensor poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature_c: f64,
    pub humidity_pct: Option<f64>,
}

impl SensorReading {
    pub fn new(temperature_c: f64, humidity_pct: Option<f64>) -> Self {
        Self {
            temperature_c,
            humidity_pct,
        }
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.humidity_pct {
            Some(h) => write!(f, "{:.1}°C {:.0}%", self.temperature_c, h),
            None => write!(f, "{:.1}°C", self.temperature_c),
        }
    }
}
