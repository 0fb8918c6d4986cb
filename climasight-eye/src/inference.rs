//! Background inference loop

use climasight_core::{
    Detection, DetectionFilter, Detector, Result, SharedState, StopSignal, WorkerHandle,
};
use crate::models::class_name;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Counters reported when the worker exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceSummary {
    pub inferences: u64,
    pub failures: u64,
    /// Frames published while the detector was busy and never analyzed.
    pub frames_superseded: u64,
}

/// Pulls the latest frame, runs the detector outside the state lock and publishes the
/// result. Frames published while a detection is running are skipped, not queued.
pub struct InferenceWorker {
    state: Arc<SharedState>,
    detector: Box<dyn Detector>,
    filter: DetectionFilter,
    poll_interval: Duration,
    stats_window: Duration,
    stop: StopSignal,
}

impl InferenceWorker {
    pub fn new(
        state: Arc<SharedState>,
        detector: Box<dyn Detector>,
        filter: DetectionFilter,
        stop: StopSignal,
    ) -> Self {
        Self {
            state,
            detector,
            filter,
            poll_interval: Duration::from_millis(10),
            stats_window: Duration::from_secs(10),
            stop,
        }
    }

    /// Upper bound on the idle wait when no new frame is available.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_stats_window(mut self, window: Duration) -> Self {
        self.stats_window = window;
        self
    }

    pub fn spawn(self) -> Result<WorkerHandle> {
        WorkerHandle::spawn("inference", move || {
            self.run();
        })
    }

    /// Run until the stop signal is triggered.
    pub fn run(mut self) -> InferenceSummary {
        info!(
            "Inference worker started ({}, class {} '{}', confidence >= {})",
            self.detector.name(),
            self.filter.class_id,
            class_name(self.filter.class_id),
            self.filter.min_confidence
        );
        let mut summary = InferenceSummary::default();
        let mut last_sequence = 0u64;
        let mut window_start = Instant::now();
        let mut window_inferences = 0u64;

        while !self.stop.is_triggered() {
            let Some(frame) = self.state.wait_for_frame(last_sequence, self.poll_interval) else {
                continue;
            };
            if last_sequence > 0 {
                summary.frames_superseded += frame.sequence().saturating_sub(last_sequence + 1);
            }
            last_sequence = frame.sequence();

            let started = Instant::now();
            match self.detector.detect(&frame, &self.filter) {
                Ok(boxes) => {
                    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                    debug!(
                        "frame {}: {} detections in {:.1} ms",
                        frame.sequence(),
                        boxes.len(),
                        elapsed_ms
                    );
                    self.state
                        .publish_detection(Detection::new(boxes, frame.sequence(), elapsed_ms));
                    summary.inferences += 1;
                    window_inferences += 1;
                }
                Err(e) => {
                    summary.failures += 1;
                    warn!("Detection failed on frame {}: {}", frame.sequence(), e);
                }
            }

            let window = window_start.elapsed();
            if window >= self.stats_window {
                info!(
                    "Inference: {:.1}/s, {} frames superseded so far",
                    window_inferences as f64 / window.as_secs_f64(),
                    summary.frames_superseded
                );
                window_start = Instant::now();
                window_inferences = 0;
            }
        }

        info!(
            "Inference worker stopped: {} inferences, {} failures, {} frames superseded",
            summary.inferences, summary.failures, summary.frames_superseded
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::ScriptedDetector;
    use climasight_core::{BoundingBox, Error, Frame};
    use std::thread;

    fn frame() -> Frame {
        Frame::from_rgb(32, 32, vec![0; 32 * 32 * 3]).unwrap()
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn detect(&mut self, _: &Frame, _: &DetectionFilter) -> Result<Vec<BoundingBox>> {
            Err(Error::Detector("tensor shape mismatch".to_string()))
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_idles_without_frames() {
        let state = Arc::new(SharedState::new());
        let stop = StopSignal::new();
        let worker = InferenceWorker::new(
            state.clone(),
            Box::new(ScriptedDetector::new(vec![3])),
            DetectionFilter::default(),
            stop.clone(),
        )
        .spawn()
        .unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(state.read_detection().is_empty_sentinel());
        stop.trigger();
        assert!(worker.join_timeout(Duration::from_secs(2)));
    }

    #[test]
    fn test_publishes_detection_for_latest_frame() {
        let state = Arc::new(SharedState::new());
        let stop = StopSignal::new();
        let worker = InferenceWorker::new(
            state.clone(),
            Box::new(ScriptedDetector::new(vec![2])),
            DetectionFilter::default(),
            stop.clone(),
        )
        .spawn()
        .unwrap();

        let seq = state.publish_frame(frame());
        assert!(wait_until(|| state.read_detection().frame_sequence() == seq));
        assert_eq!(state.read_detection().count(), 2);

        stop.trigger();
        assert!(worker.join_timeout(Duration::from_secs(2)));
    }

    #[test]
    fn test_does_not_reanalyze_same_frame() {
        let state = Arc::new(SharedState::new());
        state.publish_frame(frame());
        let stop = StopSignal::new();
        let handle = {
            let state = state.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let detector = Box::new(ScriptedDetector::new(vec![1]));
                InferenceWorker::new(state, detector, DetectionFilter::default(), stop).run()
            })
        };
        assert!(wait_until(|| state.stats().detections_published == 1));
        thread::sleep(Duration::from_millis(50));
        stop.trigger();
        let summary = handle.join().unwrap();
        assert_eq!(summary.inferences, 1);
        assert_eq!(state.stats().detections_published, 1);
    }

    #[test]
    fn test_slow_detector_skips_frames() {
        let state = Arc::new(SharedState::new());
        let stop = StopSignal::new();
        let handle = {
            let state = state.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let detector =
                    ScriptedDetector::new(vec![1]).with_latency(Duration::from_millis(40));
                let filter = DetectionFilter::default();
                InferenceWorker::new(state, Box::new(detector), filter, stop).run()
            })
        };
        for _ in 0..40 {
            state.publish_frame(frame());
            thread::sleep(Duration::from_millis(5));
        }
        let last = state.publish_frame(frame());
        assert!(wait_until(|| state.read_detection().frame_sequence() == last));
        stop.trigger();
        let summary = handle.join().unwrap();
        assert!(summary.inferences < 41);
        assert!(summary.frames_superseded > 0);
    }

    #[test]
    fn test_detector_errors_publish_nothing() {
        let state = Arc::new(SharedState::new());
        state.publish_frame(frame());
        let stop = StopSignal::new();
        let handle = {
            let state = state.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let filter = DetectionFilter::default();
                InferenceWorker::new(state, Box::new(FailingDetector), filter, stop).run()
            })
        };
        thread::sleep(Duration::from_millis(50));
        stop.trigger();
        let summary = handle.join().unwrap();
        assert_eq!(summary.failures, 1);
        assert!(state.read_detection().is_empty_sentinel());
    }
}
