//! Thin I/O seams: camera, detector, sensor and renderer.
//!
//! Implementations live in `climasight-eye` and `climasight-sc`; the loops only ever see
//! these traits, so tests can swap in scripted or mocked collaborators.

use crate::error::Result;
use crate::regulation::RegulationResult;
use crate::state::PipelineStats;
use crate::types::{BoundingBox, Detection, DetectionFilter, Frame, SensorReading};

/// Frame source. `start` and `stop` bracket the capture session.
pub trait Camera: Send {
    fn start(&mut self) -> Result<()>;

    /// Grab the next frame in RGB order. Errors are treated as transient by the caller.
    fn capture(&mut self) -> Result<Frame>;

    /// Release the device. Must be safe to call more than once.
    fn stop(&mut self);
}

/// Person detector. Returns only boxes matching `filter`.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame, filter: &DetectionFilter) -> Result<Vec<BoundingBox>>;

    fn name(&self) -> &str {
        "detector"
    }
}

pub trait Sensor: Send {
    fn poll(&mut self) -> Result<SensorReading>;

    fn name(&self) -> &str {
        "sensor"
    }
}

/// Everything the renderer draws for one tick.
#[derive(Debug, Clone, Copy)]
pub struct DashboardView<'a> {
    pub frame: &'a Frame,
    pub detection: &'a Detection,
    pub sensor: Option<&'a SensorReading>,
    pub regulation: Option<&'a RegulationResult>,
    pub relay_engaged: bool,
    pub display_fps: f64,
    pub stats: PipelineStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderControl {
    Continue,
    Quit,
}

/// Dashboard output. Also the source of the keyboard quit request.
pub trait Renderer {
    fn render(&mut self, view: &DashboardView<'_>) -> Result<RenderControl>;

    /// Release the display. Called once, after the camera is released.
    fn close(&mut self);
}
