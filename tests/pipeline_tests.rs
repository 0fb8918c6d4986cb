use climasight_cli::{CaptureDisplayLoop, StopReason};
use climasight_core::{
    BoundingBox, DashboardView, DetectionFilter, Detector, Error, Frame, HvacAction,
    RegulationPolicy, RenderControl, Renderer, Season, SeasonPolicy, SeasonSelector, Sensor,
    SensorReading, SharedState, StopSignal,
};
use climasight_eye::{HeadlessRenderer, InferenceWorker, SyntheticCamera};
use climasight_sc::SensorWorker;
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Yolo {}

    impl Detector for Yolo {
        fn detect(
            &mut self,
            frame: &Frame,
            filter: &DetectionFilter,
        ) -> climasight_core::Result<Vec<BoundingBox>>;
    }
}

mock! {
    pub Dht {}

    impl Sensor for Dht {
        fn poll(&mut self) -> climasight_core::Result<SensorReading>;
    }
}

/// Quits once a regulation result matches what the test waits for.
struct QuitWhen<F: FnMut(&DashboardView<'_>) -> bool> {
    done: F,
}

impl<F: FnMut(&DashboardView<'_>) -> bool> Renderer for QuitWhen<F> {
    fn render(&mut self, view: &DashboardView<'_>) -> climasight_core::Result<RenderControl> {
        if (self.done)(view) {
            Ok(RenderControl::Quit)
        } else {
            Ok(RenderControl::Continue)
        }
    }

    fn close(&mut self) {}
}

fn quit_when<F>(done: F) -> QuitWhen<F>
where
    F: FnMut(&DashboardView<'_>) -> bool,
{
    QuitWhen { done }
}

fn three_people() -> MockYolo {
    let mut detector = MockYolo::new();
    detector.expect_detect().returning(|_, filter| {
        Ok((0..3)
            .map(|i| {
                let x = i as f32 * 10.0;
                BoundingBox::new(x, 0.0, x + 8.0, 20.0, 0.9, filter.class_id)
            })
            .collect())
    });
    detector
}

#[test]
fn test_detection_and_sensor_reach_regulation() {
    let state = Arc::new(SharedState::new());
    let stop = StopSignal::new();

    let mut sensor = MockDht::new();
    sensor.expect_poll().returning(|| Ok(SensorReading::new(18.2, Some(41.0))));

    let detector = Box::new(three_people());
    let filter = DetectionFilter::default();
    let inference = InferenceWorker::new(state.clone(), detector, filter, stop.clone())
        .spawn()
        .unwrap();
    let sensor = SensorWorker::new(state.clone(), Box::new(sensor), stop.clone())
        .with_interval(Duration::from_millis(10))
        .spawn()
        .unwrap();

    let renderer = quit_when(|view| {
        view.regulation
            .map_or(false, |r| r.occupancy == 3 && r.temperature.is_some())
    });
    let camera = Box::new(SyntheticCamera::new(64, 48));
    let renderer = Box::new(renderer);
    let mut dashboard = CaptureDisplayLoop::new(state.clone(), camera, renderer, stop.clone())
        .with_seasons(SeasonSelector::new(SeasonPolicy::fixed(Season::Winter)))
        .with_regulation_interval(Duration::ZERO)
        .with_frame_interval(Duration::from_millis(1))
        .with_max_frames(Some(5000));
    dashboard.add_worker(inference);
    dashboard.add_worker(sensor);

    let summary = dashboard.run().unwrap();
    assert_eq!(summary.stop_reason, StopReason::Quit);
    assert_eq!(summary.workers_detached, 0);
    assert!(stop.is_triggered());

    let result = summary.last_result.unwrap();
    assert_eq!(result.band_label, "MOYEN");
    assert_eq!(result.target, 19.0);
    assert_eq!(result.action, HvacAction::On);
    assert_eq!(result.thermal_load_w, 300.0);
}

#[test]
fn test_dead_sensor_keeps_standby() {
    let state = Arc::new(SharedState::new());
    let stop = StopSignal::new();

    let mut sensor = MockDht::new();
    sensor
        .expect_poll()
        .returning(|| Err(Error::Sensor("no response".to_string())));
    let sensor = SensorWorker::new(state.clone(), Box::new(sensor), stop.clone())
        .with_interval(Duration::from_millis(5))
        .spawn()
        .unwrap();

    let mut dashboard = CaptureDisplayLoop::new(
        state.clone(),
        Box::new(SyntheticCamera::new(16, 16)),
        Box::new(HeadlessRenderer::new(Duration::from_secs(60))),
        stop,
    )
    .with_policy(RegulationPolicy::default())
    .with_regulation_interval(Duration::ZERO)
    .with_frame_interval(Duration::from_millis(2))
    .with_max_frames(Some(30));
    dashboard.add_worker(sensor);

    let summary = dashboard.run().unwrap();
    assert_eq!(summary.stop_reason, StopReason::MaxFrames);
    assert_eq!(summary.regulations, 30);
    assert_eq!(summary.last_result.unwrap().action, HvacAction::Standby);
    assert!(state.read_sensor().is_none());
}
