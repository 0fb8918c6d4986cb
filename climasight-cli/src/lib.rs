//! climasight-cli: the capture/display loop and the runtime wiring behind the
//! `climasight` binary.

pub mod dashboard;
pub mod runtime;

pub use dashboard::{CaptureDisplayLoop, LoopSummary, StopReason};
pub use runtime::{build_detector, open_sensor, run_pipeline};
