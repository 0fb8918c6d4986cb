//! Wiring: builds the collaborators from configuration, spawns the workers and runs the
//! capture/display loop on the calling thread.

use crate::dashboard::{CaptureDisplayLoop, LoopSummary};
use anyhow::Context;
use climasight_core::{
    Camera, ClimaConfig, Detector, Renderer, SeasonSelector, Sensor, SharedState, StopSignal,
};
use climasight_eye::{HeadlessRenderer, InferenceWorker, ScriptedDetector, SyntheticCamera};
use climasight_sc::{IioSensor, SensorWorker, SimulatedSensor};
use std::sync::Arc;
use tracing::{info, warn};

/// Load the person detector. Any failure here is fatal.
pub fn build_detector(config: &ClimaConfig) -> anyhow::Result<Box<dyn Detector>> {
    if config.runtime.simulate {
        info!("Simulation mode: scripted detector");
        return Ok(Box::new(ScriptedDetector::demo().with_class_id(config.detector.class_id)));
    }
    load_model(config)
}

#[cfg(feature = "onnx")]
fn load_model(config: &ClimaConfig) -> anyhow::Result<Box<dyn Detector>> {
    let detector = climasight_eye::OnnxPersonDetector::load(
        std::path::Path::new(&config.detector.model_path),
        config.detector.input_size,
        config.detector.nms_iou,
    )
    .map_err(climasight_core::Error::from)
    .with_context(|| format!("loading detector model {}", config.detector.model_path))?;
    Ok(Box::new(detector))
}

#[cfg(not(feature = "onnx"))]
fn load_model(config: &ClimaConfig) -> anyhow::Result<Box<dyn Detector>> {
    anyhow::bail!(
        "cannot load {}: built without the `onnx` feature (use --simulate)",
        config.detector.model_path
    )
}

fn build_camera(config: &ClimaConfig) -> anyhow::Result<Box<dyn Camera>> {
    if config.runtime.simulate {
        return Ok(Box::new(SyntheticCamera::new(config.camera.width, config.camera.height)));
    }
    open_camera(config)
}

#[cfg(feature = "opencv")]
fn open_camera(config: &ClimaConfig) -> anyhow::Result<Box<dyn Camera>> {
    Ok(Box::new(climasight_eye::OpenCvCamera::new(config.camera.clone())))
}

#[cfg(not(feature = "opencv"))]
fn open_camera(_config: &ClimaConfig) -> anyhow::Result<Box<dyn Camera>> {
    anyhow::bail!("no camera backend: built without the `opencv` feature (use --simulate)")
}

#[cfg(feature = "opencv")]
fn build_renderer(config: &ClimaConfig) -> anyhow::Result<Box<dyn Renderer>> {
    if config.runtime.headless {
        return Ok(Box::new(HeadlessRenderer::default()));
    }
    let dashboard = climasight_eye::OpenCvDashboard::new()
        .map_err(climasight_core::Error::from)
        .context("opening dashboard window")?;
    Ok(Box::new(dashboard))
}

#[cfg(not(feature = "opencv"))]
fn build_renderer(config: &ClimaConfig) -> anyhow::Result<Box<dyn Renderer>> {
    if !config.runtime.headless {
        info!("Built without a display backend, logging the dashboard instead");
    }
    Ok(Box::new(HeadlessRenderer::default()))
}

/// The configured sensor, or `None` when it is disabled or absent. Absence is not an error:
/// regulation runs in STANDBY until a temperature is known.
pub fn open_sensor(config: &ClimaConfig) -> Option<Box<dyn Sensor>> {
    if !config.sensor.enabled {
        info!("Sensor disabled, temperature stays unknown");
        return None;
    }
    if config.runtime.simulate {
        return Some(Box::new(SimulatedSensor::default()));
    }
    match IioSensor::discover(&config.sensor.iio_root, &config.sensor.device_name) {
        Ok(sensor) => Some(Box::new(sensor)),
        Err(e) => {
            warn!("No temperature sensor: {}. Regulation will stay in STANDBY", e);
            None
        }
    }
}

/// Build everything from `config` and run the display loop until it stops.
///
/// Blocks the calling thread. The renderer is created here, so the display is owned by the
/// thread that drives it.
pub fn run_pipeline(config: &ClimaConfig, stop: StopSignal) -> anyhow::Result<LoopSummary> {
    let detector = build_detector(config)?;
    let camera = build_camera(config)?;
    let renderer = build_renderer(config)?;
    let state = Arc::new(SharedState::new());

    let mut dashboard = CaptureDisplayLoop::new(state.clone(), camera, renderer, stop.clone())
        .with_policy(config.regulation.clone())
        .with_seasons(SeasonSelector::new(config.season.policy()))
        .with_regulation_interval(config.runtime.regulation_interval())
        .with_frame_interval(config.camera.frame_interval())
        .with_max_consecutive_failures(config.camera.max_consecutive_failures)
        .with_max_frames(config.runtime.max_frames)
        .with_join_timeout(config.runtime.join_timeout());

    let filter = config.detector.filter();
    let inference = InferenceWorker::new(state.clone(), detector, filter, stop.clone())
        .with_poll_interval(config.detector.poll_interval())
        .with_stats_window(config.runtime.stats_window())
        .spawn()
        .context("spawning inference worker")?;
    dashboard.add_worker(inference);

    if let Some(sensor) = open_sensor(config) {
        let worker = SensorWorker::new(state, sensor, stop)
            .with_interval(config.sensor.poll_interval())
            .spawn()
            .context("spawning sensor worker")?;
        dashboard.add_worker(worker);
    }

    info!(
        "Pipeline running: season policy {:?}, margin {:.1}°C",
        config.season.policy(),
        config.regulation.margin
    );
    Ok(dashboard.run()?)
}
