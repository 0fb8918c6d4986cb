//! Error types for climasight-sc

use climasight_core::Error as CoreError;
use thiserror::Error;

/// Sensor discovery and polling errors
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Sensor device not found: {0}")]
    NotFound(String),

    #[error("Sensor read error: {0}")]
    Read(String),

    #[error("Sensor value out of range: {0}")]
    OutOfRange(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SensorError> for CoreError {
    fn from(err: SensorError) -> Self {
        CoreError::Sensor(err.to_string())
    }
}
