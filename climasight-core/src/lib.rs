pub mod error;
pub mod types;
pub mod config;
pub mod season;
pub mod regulation;
pub mod state;
pub mod worker;
pub mod collaborator;

pub use error::{Error, Result};
pub use types::{BoundingBox, Detection, DetectionFilter, Frame, SensorReading};
pub use config::{
    CameraConfig, ClimaConfig, ConfigError, DetectorConfig, RuntimeConfig, SeasonConfig,
    SensorConfig,
};
pub use season::{DateSource, HvacMode, Season, SeasonPolicy, SeasonSelector};
pub use regulation::{
    decide, regulate, thresholds, BandSetpoint, HvacAction, HvacRelay, OccupancyBand,
    RegulationPolicy, RegulationResult, RegulationThrottle, SeasonSetpoints,
};
pub use state::{PipelineStats, SharedState};
pub use worker::{join_all, StopSignal, WorkerHandle};
pub use collaborator::{Camera, DashboardView, Detector, RenderControl, Renderer, Sensor};
