//! Latest-value slots shared between the display loop and the workers.
//!
//! Each slot holds exactly one live value and publishing replaces it. One mutex guards all
//! three slots; critical sections only move `Arc`s in or out, so detection and rendering
//! always run outside the lock.

use crate::types::{Detection, Frame, SensorReading};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct Slots {
    frame: Option<Arc<Frame>>,
    detection: Arc<Detection>,
    sensor: Option<SensorReading>,
    frame_sequence: u64,
}

/// Publish counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub frames_published: u64,
    pub detections_published: u64,
    pub sensor_readings_published: u64,
    /// Sequence of the frame behind the current detection.
    pub last_detected_frame: u64,
}

impl PipelineStats {
    /// Published frames that never got a detection of their own, as seen right now.
    pub fn frames_behind(&self) -> u64 {
        self.frames_published.saturating_sub(self.last_detected_frame)
    }
}

/// Injected container for the latest frame, detection and sensor reading.
#[derive(Debug)]
pub struct SharedState {
    slots: Mutex<Slots>,
    frame_published: Condvar,
    detections_published: AtomicU64,
    sensor_readings_published: AtomicU64,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                frame: None,
                detection: Arc::new(Detection::empty()),
                sensor: None,
                frame_sequence: 0,
            }),
            frame_published: Condvar::new(),
            detections_published: AtomicU64::new(0),
            sensor_readings_published: AtomicU64::new(0),
        }
    }

    /// Replace the current frame and wake anyone waiting for a new one. Returns the
    /// sequence number stamped on the frame.
    pub fn publish_frame(&self, mut frame: Frame) -> u64 {
        let sequence = {
            let mut slots = self.slots.lock();
            slots.frame_sequence += 1;
            frame.set_sequence(slots.frame_sequence);
            slots.frame = Some(Arc::new(frame));
            slots.frame_sequence
        };
        self.frame_published.notify_all();
        sequence
    }

    /// Latest frame, or `None` before the first publish.
    pub fn read_frame(&self) -> Option<Arc<Frame>> {
        self.slots.lock().frame.clone()
    }

    /// Latest frame newer than `after_sequence`, waiting at most `timeout` for one to be
    /// published. Returns `None` on timeout.
    pub fn wait_for_frame(&self, after_sequence: u64, timeout: Duration) -> Option<Arc<Frame>> {
        let mut slots = self.slots.lock();
        if slots.frame_sequence <= after_sequence {
            self.frame_published.wait_for(&mut slots, timeout);
        }
        if slots.frame_sequence > after_sequence {
            slots.frame.clone()
        } else {
            None
        }
    }

    /// Wake every thread blocked in [`wait_for_frame`](Self::wait_for_frame).
    pub fn wake_waiters(&self) {
        self.frame_published.notify_all();
    }

    pub fn publish_detection(&self, detection: Detection) {
        let detection = Arc::new(detection);
        self.slots.lock().detection = detection;
        self.detections_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Latest detection, or [`Detection::empty`] before the first publish.
    pub fn read_detection(&self) -> Arc<Detection> {
        self.slots.lock().detection.clone()
    }

    pub fn publish_sensor(&self, reading: SensorReading) {
        self.slots.lock().sensor = Some(reading);
        self.sensor_readings_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Latest reading, or `None` while the temperature is unknown.
    pub fn read_sensor(&self) -> Option<SensorReading> {
        self.slots.lock().sensor
    }

    /// Detection and sensor reading taken under a single lock.
    pub fn read_inputs(&self) -> (Arc<Detection>, Option<SensorReading>) {
        let slots = self.slots.lock();
        (slots.detection.clone(), slots.sensor)
    }

    pub fn stats(&self) -> PipelineStats {
        let (frames_published, last_detected_frame) = {
            let slots = self.slots.lock();
            (slots.frame_sequence, slots.detection.frame_sequence())
        };
        PipelineStats {
            frames_published,
            detections_published: self.detections_published.load(Ordering::Relaxed),
            sensor_readings_published: self.sensor_readings_published.load(Ordering::Relaxed),
            last_detected_frame,
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
