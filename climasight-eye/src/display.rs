//! Dashboard renderers

use climasight_core::{DashboardView, RegulationResult, RenderControl, Renderer, Result};
use std::time::{Duration, Instant};
use tracing::info;

/// One-line operator summary of a dashboard view.
pub fn summary_line(view: &DashboardView<'_>) -> String {
    let temperature = view
        .sensor
        .map(|s| s.to_string())
        .unwrap_or_else(|| "--.-°C".to_string());
    let mut line = format!(
        "occupants={} load=+{:.0}W temp={}",
        view.detection.count(),
        view.regulation.map_or(0.0, |r| r.thermal_load_w),
        temperature
    );
    if let Some(r) = view.regulation {
        line.push_str(&format!(
            " season={} band={}/{} target={:.1} on={:.1} off={:.1} fan={}% action={} relay={}",
            r.season,
            r.band_label,
            r.band_state,
            r.target,
            r.threshold_on,
            r.threshold_off,
            r.fan_level,
            r.action_text(),
            if view.relay_engaged { "engaged" } else { "idle" }
        ));
    }
    line.push_str(&format!(
        " lag={} fps={:.0}",
        view.stats.frames_behind(),
        view.display_fps
    ));
    line
}

/// Band line of the window overlay, e.g. `MOYEN CONFORT  FAN: 35%`.
pub fn band_caption(result: &RegulationResult) -> String {
    format!("{} {}  FAN: {}%", result.band_label, result.band_state, result.fan_level)
}

/// Renderer without a window: logs the dashboard through tracing, at most once per interval.
pub struct HeadlessRenderer {
    log_interval: Duration,
    last_log: Option<Instant>,
    frames_rendered: u64,
    closed: bool,
}

impl HeadlessRenderer {
    pub fn new(log_interval: Duration) -> Self {
        Self {
            log_interval,
            last_log: None,
            frames_rendered: 0,
            closed: false,
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Renderer for HeadlessRenderer {
    fn render(&mut self, view: &DashboardView<'_>) -> Result<RenderControl> {
        self.frames_rendered += 1;
        let due = self
            .last_log
            .map_or(true, |t| t.elapsed() >= self.log_interval);
        if due {
            info!("{}", summary_line(view));
            self.last_log = Some(Instant::now());
        }
        Ok(RenderControl::Continue)
    }

    fn close(&mut self) {
        if !self.closed {
            info!("Headless dashboard closed after {} frames", self.frames_rendered);
        }
        self.closed = true;
    }
}

#[cfg(feature = "opencv")]
pub use window::OpenCvDashboard;

#[cfg(feature = "opencv")]
mod window {
    use super::band_caption;
    use crate::error::VisionError;
    use climasight_core::{DashboardView, HvacAction, RenderControl, Renderer, Result, Season};
    use opencv::{
        core::{Mat, Point, Rect, Scalar},
        highgui, imgproc,
        prelude::*,
    };
    use tracing::warn;

    const WINDOW_NAME: &str = "Smart Comfort Dashboard";

    /// HighGUI window with boxes and the regulation overlay. `q` quits.
    pub struct OpenCvDashboard {
        opened: bool,
    }

    impl OpenCvDashboard {
        pub fn new() -> std::result::Result<Self, VisionError> {
            highgui::named_window(WINDOW_NAME, highgui::WINDOW_NORMAL)?;
            Ok(Self { opened: true })
        }

        fn draw(
            &self,
            view: &DashboardView<'_>,
        ) -> std::result::Result<RenderControl, VisionError> {
            let frame = view.frame;
            let rgb = Mat::from_slice_rows_cols(
                frame.image().as_raw(),
                frame.height() as usize,
                frame.width() as usize * 3,
            )?;
            let rgb = rgb.reshape(3, frame.height() as i32)?;
            // Display wants BGR; detection always saw RGB.
            let mut img = Mat::default();
            imgproc::cvt_color(&rgb, &mut img, imgproc::COLOR_RGB2BGR, 0)?;

            let green = Scalar::new(0.0, 255.0, 0.0, 0.0);
            for b in view.detection.boxes() {
                let (x1, y1, x2, y2) = b.clamped_corners(frame.width(), frame.height());
                let rect = Rect::new(x1 as i32, y1 as i32, (x2 - x1) as i32, (y2 - y1) as i32);
                imgproc::rectangle(&mut img, rect, green, 2, imgproc::LINE_8, 0)?;
            }

            let panel = Rect::new(0, 0, frame.width() as i32, 90);
            let dark = Scalar::new(30.0, 30.0, 30.0, 0.0);
            imgproc::rectangle(&mut img, panel, dark, -1, imgproc::LINE_8, 0)?;

            let white = Scalar::new(255.0, 255.0, 255.0, 0.0);
            let grey = Scalar::new(200.0, 200.0, 200.0, 0.0);
            let count = view.detection.count();
            put(&mut img, &format!("Occupants: {}", count), (10, 30), 0.7, white, 2)?;
            let temp = view.sensor.map_or("T: --".to_string(), |s| format!("T: {}", s));
            put(&mut img, &temp, (10, 60), 0.6, Scalar::new(0.0, 165.0, 255.0, 0.0), 1)?;

            if let Some(r) = view.regulation {
                put(&mut img, &format!("Saison: {}", r.season), (220, 30), 0.6, grey, 1)?;
                put(&mut img, &band_caption(r), (220, 60), 0.5, grey, 1)?;
                let target_color = if r.season == Season::Summer {
                    Scalar::new(0.0, 0.0, 255.0, 0.0)
                } else {
                    Scalar::new(255.0, 100.0, 0.0, 0.0)
                };
                let target = format!("CIBLE: {:.1} C", r.target);
                put(&mut img, &target, (420, 30), 0.7, target_color, 2)?;
                let action_color = match r.action {
                    HvacAction::On => Scalar::new(0.0, 0.0, 255.0, 0.0),
                    HvacAction::Off => Scalar::new(0.0, 255.0, 0.0, 0.0),
                    HvacAction::Hold => Scalar::new(0.0, 255.0, 255.0, 0.0),
                    HvacAction::Standby => Scalar::new(100.0, 100.0, 100.0, 0.0),
                };
                put(&mut img, &r.action_text(), (420, 65), 0.7, action_color, 2)?;
            }
            put(
                &mut img,
                &format!("{:.0} fps", view.display_fps),
                (10, frame.height() as i32 - 10),
                0.5,
                grey,
                1,
            )?;

            highgui::imshow(WINDOW_NAME, &img)?;
            let key = highgui::wait_key(1)?;
            if key & 0xFF == 'q' as i32 {
                Ok(RenderControl::Quit)
            } else {
                Ok(RenderControl::Continue)
            }
        }
    }

    fn put(
        img: &mut Mat,
        text: &str,
        at: (i32, i32),
        scale: f64,
        color: Scalar,
        thickness: i32,
    ) -> opencv::Result<()> {
        imgproc::put_text(
            img,
            text,
            Point::new(at.0, at.1),
            imgproc::FONT_HERSHEY_SIMPLEX,
            scale,
            color,
            thickness,
            imgproc::LINE_8,
            false,
        )
    }

    impl Renderer for OpenCvDashboard {
        fn render(&mut self, view: &DashboardView<'_>) -> Result<RenderControl> {
            Ok(self.draw(view)?)
        }

        fn close(&mut self) {
            if self.opened {
                if let Err(e) = highgui::destroy_all_windows() {
                    warn!("Failed to close dashboard window: {}", e);
                }
                self.opened = false;
            }
        }
    }
}
