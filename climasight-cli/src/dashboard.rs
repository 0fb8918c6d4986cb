//! Foreground capture/display loop
//!
//! Captures every tick, publishes the frame, reads back the latest detection and sensor
//! reading, regulates when the throttle allows it and hands everything to the renderer.
//! It owns the teardown: stop signal, bounded worker joins, camera release, display release.

use climasight_core::{
    join_all, regulate, Camera, DashboardView, HvacRelay, RegulationPolicy, RegulationResult,
    RegulationThrottle, RenderControl, Renderer, Result, SeasonPolicy, SeasonSelector, SharedState,
    StopSignal, WorkerHandle,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The renderer reported a keyboard quit.
    Quit,
    /// The stop signal was triggered from outside (interrupt, terminate).
    Signal,
    /// The configured frame budget was reached.
    MaxFrames,
    /// Too many consecutive capture failures.
    CameraFailed,
}

#[derive(Debug, Clone)]
pub struct LoopSummary {
    pub frames_captured: u64,
    pub capture_failures: u64,
    pub render_failures: u64,
    pub regulations: u64,
    pub relay_switches: u64,
    pub last_result: Option<RegulationResult>,
    pub stop_reason: StopReason,
    /// Workers still running when the join deadline passed.
    pub workers_detached: usize,
}

impl LoopSummary {
    fn new() -> Self {
        Self {
            frames_captured: 0,
            capture_failures: 0,
            render_failures: 0,
            regulations: 0,
            relay_switches: 0,
            last_result: None,
            stop_reason: StopReason::Signal,
            workers_detached: 0,
        }
    }
}

/// Smoothed display rate.
#[derive(Debug, Default)]
struct FpsMeter {
    last: Option<Instant>,
    fps: f64,
}

impl FpsMeter {
    fn tick(&mut self, now: Instant) -> f64 {
        if let Some(last) = self.last {
            let dt = now.saturating_duration_since(last).as_secs_f64();
            if dt > 0.0 {
                let instant = 1.0 / dt;
                self.fps = if self.fps == 0.0 { instant } else { 0.9 * self.fps + 0.1 * instant };
            }
        }
        self.last = Some(now);
        self.fps
    }
}

pub struct CaptureDisplayLoop {
    state: Arc<SharedState>,
    camera: Box<dyn Camera>,
    renderer: Box<dyn Renderer>,
    stop: StopSignal,
    workers: Vec<WorkerHandle>,
    policy: RegulationPolicy,
    seasons: SeasonSelector,
    throttle: RegulationThrottle,
    relay: HvacRelay,
    frame_interval: Duration,
    max_consecutive_failures: u32,
    max_frames: Option<u64>,
    join_timeout: Duration,
}

impl CaptureDisplayLoop {
    pub fn new(
        state: Arc<SharedState>,
        camera: Box<dyn Camera>,
        renderer: Box<dyn Renderer>,
        stop: StopSignal,
    ) -> Self {
        Self {
            state,
            camera,
            renderer,
            stop,
            workers: Vec::new(),
            policy: RegulationPolicy::default(),
            seasons: SeasonSelector::new(SeasonPolicy::calendar()),
            throttle: RegulationThrottle::new(Duration::from_secs(1)),
            relay: HvacRelay::new(),
            frame_interval: Duration::from_millis(16),
            max_consecutive_failures: 50,
            max_frames: None,
            join_timeout: Duration::from_secs(1),
        }
    }

    pub fn with_policy(mut self, policy: RegulationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_seasons(mut self, seasons: SeasonSelector) -> Self {
        self.seasons = seasons;
        self
    }

    pub fn with_regulation_interval(mut self, interval: Duration) -> Self {
        self.throttle = RegulationThrottle::new(interval);
        self
    }

    /// Minimum tick period. Cameras that block on capture set their own pace.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_max_consecutive_failures(mut self, failures: u32) -> Self {
        self.max_consecutive_failures = failures.max(1);
        self
    }

    pub fn with_max_frames(mut self, frames: Option<u64>) -> Self {
        self.max_frames = frames;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Hand over a background worker; it is joined during teardown.
    pub fn add_worker(&mut self, worker: WorkerHandle) {
        self.workers.push(worker);
    }

    /// Run until quit, stop signal, frame budget or camera failure, then tear down.
    /// Teardown also runs when the camera fails to start.
    pub fn run(mut self) -> Result<LoopSummary> {
        let outcome = match self.camera.start() {
            Ok(()) => self.ticks(),
            Err(e) => {
                error!("Camera failed to start: {}", e);
                Err(e)
            }
        };
        let detached = self.teardown();
        outcome.map(|mut summary| {
            summary.workers_detached = detached;
            summary
        })
    }

    fn ticks(&mut self) -> Result<LoopSummary> {
        let mut summary = LoopSummary::new();
        let mut consecutive_failures = 0u32;
        let mut fps = FpsMeter::default();

        loop {
            if self.stop.is_triggered() {
                summary.stop_reason = StopReason::Signal;
                break;
            }
            if self.max_frames.map_or(false, |max| summary.frames_captured >= max) {
                summary.stop_reason = StopReason::MaxFrames;
                break;
            }
            let tick_start = Instant::now();

            match self.camera.capture() {
                Ok(frame) => {
                    consecutive_failures = 0;
                    summary.frames_captured += 1;
                    self.state.publish_frame(frame);
                }
                Err(e) => {
                    summary.capture_failures += 1;
                    consecutive_failures += 1;
                    if consecutive_failures >= self.max_consecutive_failures {
                        error!(
                            "Camera failed {} times in a row, giving up: {}",
                            consecutive_failures, e
                        );
                        summary.stop_reason = StopReason::CameraFailed;
                        break;
                    }
                    debug!("Frame capture failed: {}", e);
                    if self.stop.sleep(self.frame_interval) {
                        summary.stop_reason = StopReason::Signal;
                        break;
                    }
                    continue;
                }
            }

            let Some(frame) = self.state.read_frame() else {
                continue;
            };
            let (detection, sensor) = self.state.read_inputs();

            if self.throttle.poll(Instant::now()) {
                let season = self.seasons.current();
                let result = regulate(
                    detection.count(),
                    season,
                    sensor.map(|s| s.temperature_c),
                    &self.policy,
                )?;
                if self.relay.apply(result.action) {
                    summary.relay_switches += 1;
                    info!(
                        "{} relay {} (occupants {}, target {:.1}°C, temp {})",
                        result.mode.short_label(),
                        if self.relay.is_engaged() { "engaged" } else { "released" },
                        result.occupancy,
                        result.target,
                        result
                            .temperature
                            .map_or("unknown".to_string(), |t| format!("{:.1}°C", t))
                    );
                }
                debug!(
                    "Regulation: {} occupants, band {} -> {}",
                    result.occupancy,
                    result.band_label,
                    result.action_text()
                );
                summary.regulations += 1;
                summary.last_result = Some(result);
            }

            let display_fps = fps.tick(Instant::now());
            let view = DashboardView {
                frame: &frame,
                detection: &detection,
                sensor: sensor.as_ref(),
                regulation: summary.last_result.as_ref(),
                relay_engaged: self.relay.is_engaged(),
                display_fps,
                stats: self.state.stats(),
            };
            match self.renderer.render(&view) {
                Ok(RenderControl::Continue) => {}
                Ok(RenderControl::Quit) => {
                    info!("Quit requested from the dashboard");
                    summary.stop_reason = StopReason::Quit;
                    break;
                }
                Err(e) => {
                    summary.render_failures += 1;
                    warn!("Render failed: {}", e);
                }
            }

            let elapsed = tick_start.elapsed();
            if elapsed < self.frame_interval && self.stop.sleep(self.frame_interval - elapsed) {
                summary.stop_reason = StopReason::Signal;
                break;
            }
        }

        Ok(summary)
    }

    /// Returns the number of workers that had to be detached.
    fn teardown(&mut self) -> usize {
        self.stop.trigger();
        self.state.wake_waiters();

        let workers = std::mem::take(&mut self.workers);
        let total = workers.len();
        let stopped = join_all(workers, self.join_timeout);
        if stopped < total {
            warn!("{} of {} workers did not stop in time", total - stopped, total);
        }

        self.camera.stop();
        self.renderer.close();
        info!("Pipeline shut down");
        total - stopped
    }
}
