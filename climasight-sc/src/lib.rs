//! climasight-sc: environmental sensing
//!
//! Temperature and humidity sources behind the core [`Sensor`](climasight_core::Sensor)
//! trait, and the low-frequency [`SensorWorker`] that publishes readings:
//! - Linux IIO sysfs devices such as the `dht11` kernel driver
//! - A simulated sensor for running without hardware

pub mod error;
pub mod sensor;
pub mod worker;

pub use error::SensorError;
pub use sensor::{IioSensor, SimulatedSensor};
pub use worker::{SensorSummary, SensorWorker};
