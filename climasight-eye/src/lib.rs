//! climasight-eye: vision side of climasight
//!
//! Camera sources, person detectors and the dashboard renderers, plus the
//! [`InferenceWorker`] that keeps the latest detection fresh in the shared state.
//!
//! Hardware backends are behind cargo features: `opencv` for camera capture and the
//! HighGUI dashboard, `onnx` for YOLOv8 through ONNX Runtime. Without them the crate
//! still provides the synthetic camera, the scripted detector and the headless renderer.

pub mod camera;
pub mod detector;
pub mod display;
pub mod error;
pub mod inference;
pub mod models;
pub mod processing;

pub use camera::SyntheticCamera;
pub use detector::ScriptedDetector;
pub use display::HeadlessRenderer;
pub use error::VisionError;
pub use inference::{InferenceSummary, InferenceWorker};

#[cfg(feature = "opencv")]
pub use camera::OpenCvCamera;
#[cfg(feature = "opencv")]
pub use display::OpenCvDashboard;
#[cfg(feature = "onnx")]
pub use models::OnnxPersonDetector;
