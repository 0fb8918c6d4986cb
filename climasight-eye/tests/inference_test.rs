use climasight_core::{
    BoundingBox, DetectionFilter, Detector, Error, Frame, SharedState, StopSignal,
};
use climasight_eye::{InferenceWorker, ScriptedDetector, SyntheticCamera};
use climasight_core::Camera;
use mockall::mock;
use mockall::predicate::always;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

mock! {
    pub PersonDetector {}

    impl Detector for PersonDetector {
        fn detect(
            &mut self,
            frame: &Frame,
            filter: &DetectionFilter,
        ) -> climasight_core::Result<Vec<BoundingBox>>;
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
fn test_worker_passes_configured_filter() {
    let mut detector = MockPersonDetector::new();
    detector
        .expect_detect()
        .withf(|_, filter| filter.class_id == 0 && filter.min_confidence == 0.5)
        .returning(|frame, _| {
            let (w, h) = (frame.width() as f32, frame.height() as f32);
            Ok(vec![BoundingBox::new(0.0, 0.0, w, h, 0.8, 0)])
        });

    let state = Arc::new(SharedState::new());
    let stop = StopSignal::new();
    let filter = DetectionFilter::new(0, 0.5);
    let handle = InferenceWorker::new(state.clone(), Box::new(detector), filter, stop.clone())
        .spawn()
        .unwrap();

    let mut camera = SyntheticCamera::new(64, 48);
    camera.start().unwrap();
    let seq = state.publish_frame(camera.capture().unwrap());

    assert!(wait_until(|| state.read_detection().frame_sequence() == seq));
    let det = state.read_detection();
    assert_eq!(det.count(), 1);
    assert_eq!(det.boxes()[0].x2, 64.0);

    stop.trigger();
    assert!(handle.join_timeout(Duration::from_secs(2)));
}

#[test]
fn test_worker_survives_detector_failure() {
    let mut detector = MockPersonDetector::new();
    let mut calls = 0;
    detector
        .expect_detect()
        .with(always(), always())
        .returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Err(Error::Detector("inference timeout".to_string()))
            } else {
                Ok(vec![BoundingBox::new(1.0, 1.0, 5.0, 5.0, 0.9, 0)])
            }
        });

    let state = Arc::new(SharedState::new());
    let stop = StopSignal::new();
    let filter = DetectionFilter::default();
    let handle = InferenceWorker::new(state.clone(), Box::new(detector), filter, stop.clone())
        .spawn()
        .unwrap();

    let frame = || Frame::from_rgb(8, 8, vec![0; 8 * 8 * 3]).unwrap();
    state.publish_frame(frame());
    thread::sleep(Duration::from_millis(30));
    assert!(state.read_detection().is_empty_sentinel());

    let seq = state.publish_frame(frame());
    assert!(wait_until(|| state.read_detection().frame_sequence() == seq));
    assert_eq!(state.read_detection().count(), 1);

    stop.trigger();
    assert!(handle.join_timeout(Duration::from_secs(2)));
}

#[test]
fn test_stop_interrupts_idle_worker_quickly() {
    let state = Arc::new(SharedState::new());
    let stop = StopSignal::new();
    let handle = InferenceWorker::new(
        state.clone(),
        Box::new(ScriptedDetector::new(vec![1])),
        DetectionFilter::default(),
        stop.clone(),
    )
    .with_poll_interval(Duration::from_millis(10))
    .spawn()
    .unwrap();

    thread::sleep(Duration::from_millis(20));
    let start = Instant::now();
    stop.trigger();
    state.wake_waiters();
    assert!(handle.join_timeout(Duration::from_secs(1)));
    assert!(start.elapsed() < Duration::from_millis(500));
}
