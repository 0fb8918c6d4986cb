//! Scripted person detector for simulation mode

use climasight_core::{BoundingBox, Detector, DetectionFilter, Frame, Result};
use std::thread;
use std::time::Duration;

const SCRIPTED_CONFIDENCE: f32 = 0.9;

/// Replays an occupancy schedule, one entry per `calls_per_step` detections, with an
/// optional artificial latency to mimic a real model on a small board.
pub struct ScriptedDetector {
    schedule: Vec<u32>,
    calls_per_step: u64,
    latency: Duration,
    calls: u64,
    class_id: u32,
}

impl ScriptedDetector {
    pub fn new(schedule: Vec<u32>) -> Self {
        Self {
            schedule,
            calls_per_step: 1,
            latency: Duration::ZERO,
            calls: 0,
            class_id: 0,
        }
    }

    /// A slowly evolving room: empty, a few people, a crowd, then emptying out.
    pub fn demo() -> Self {
        Self::new(vec![0, 0, 1, 2, 3, 3, 4, 6, 8, 11, 12, 12, 9, 5, 2, 1])
            .with_calls_per_step(20)
            .with_latency(Duration::from_millis(200))
    }

    pub fn with_calls_per_step(mut self, calls: u64) -> Self {
        self.calls_per_step = calls.max(1);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Class id stamped on the generated boxes.
    pub fn with_class_id(mut self, class_id: u32) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn occupancy(&self) -> u32 {
        if self.schedule.is_empty() {
            return 0;
        }
        let step = (self.calls / self.calls_per_step) as usize;
        self.schedule[step % self.schedule.len()]
    }

    /// Lay `count` boxes out on a grid covering the frame.
    fn boxes(&self, count: u32, width: u32, height: u32) -> Vec<BoundingBox> {
        if count == 0 {
            return Vec::new();
        }
        let cols = (count as f32).sqrt().ceil() as u32;
        let rows = count.div_ceil(cols);
        let cell_w = width as f32 / cols as f32;
        let cell_h = height as f32 / rows as f32;
        (0..count)
            .map(|i| {
                let (c, r) = ((i % cols) as f32, (i / cols) as f32);
                BoundingBox::new(
                    c * cell_w + cell_w * 0.2,
                    r * cell_h + cell_h * 0.1,
                    c * cell_w + cell_w * 0.8,
                    r * cell_h + cell_h * 0.9,
                    SCRIPTED_CONFIDENCE,
                    self.class_id,
                )
            })
            .collect()
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame, filter: &DetectionFilter) -> Result<Vec<BoundingBox>> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        let count = self.occupancy();
        self.calls += 1;
        if !filter.accepts(self.class_id, SCRIPTED_CONFIDENCE) {
            return Ok(Vec::new());
        }
        Ok(self.boxes(count, frame.width(), frame.height()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::from_rgb(100, 100, vec![0; 100 * 100 * 3]).unwrap()
    }

    #[test]
    fn test_schedule_replay() {
        let mut det = ScriptedDetector::new(vec![0, 3, 5]);
        let f = DetectionFilter::default();
        let counts: Vec<usize> = (0..4).map(|_| det.detect(&frame(), &f).unwrap().len()).collect();
        assert_eq!(counts, vec![0, 3, 5, 0]);
        assert_eq!(det.calls(), 4);
    }

    #[test]
    fn test_calls_per_step() {
        let mut det = ScriptedDetector::new(vec![1, 2]).with_calls_per_step(2);
        let f = DetectionFilter::default();
        let counts: Vec<usize> = (0..4).map(|_| det.detect(&frame(), &f).unwrap().len()).collect();
        assert_eq!(counts, vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_boxes_inside_frame() {
        let mut det = ScriptedDetector::new(vec![7]);
        let boxes = det.detect(&frame(), &DetectionFilter::default()).unwrap();
        assert_eq!(boxes.len(), 7);
        for b in boxes {
            assert!(b.x1 >= 0.0 && b.x2 <= 100.0 && b.y1 >= 0.0 && b.y2 <= 100.0);
            assert!(b.area() > 0.0);
        }
    }

    #[test]
    fn test_filter_respected() {
        let mut det = ScriptedDetector::new(vec![4]);
        assert!(det.detect(&frame(), &DetectionFilter::new(2, 0.5)).unwrap().is_empty());
        assert!(det.detect(&frame(), &DetectionFilter::new(0, 0.95)).unwrap().is_empty());
    }

    #[test]
    fn test_empty_schedule() {
        let mut det = ScriptedDetector::new(Vec::new());
        assert!(det.detect(&frame(), &DetectionFilter::default()).unwrap().is_empty());
    }
}
