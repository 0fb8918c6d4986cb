// Configuration system for climasight

use crate::error::Error;
use crate::regulation::RegulationPolicy;
use crate::season::{Season, SeasonPolicy};
use crate::types::DetectionFilter;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Person detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub model_path: String,
    pub confidence: f32,
    pub class_id: u32,
    /// Square network input, in pixels.
    pub input_size: u32,
    pub nms_iou: f32,
    /// Idle wait when no new frame is available.
    pub poll_interval_ms: u64,
}

impl DetectorConfig {
    pub fn filter(&self) -> DetectionFilter {
        DetectionFilter::new(self.class_id, self.confidence)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "yolov8s.onnx".to_string(),
            confidence: 0.5,
            class_id: 0,
            input_size: 640,
            nms_iou: 0.45,
            poll_interval_ms: 10,
        }
    }
}

/// Camera configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub camera_id: u32,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    /// Capture errors in a row before the display loop gives up.
    pub max_consecutive_failures: u32,
}

impl CameraConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.max(1) as f64)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            camera_id: 0,
            width: 640,
            height: 480,
            target_fps: 60,
            max_consecutive_failures: 50,
        }
    }
}

/// Environmental sensor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub enabled: bool,
    /// IIO driver name to look for, e.g. `dht11`.
    pub device_name: String,
    pub iio_root: String,
    pub poll_interval_ms: u64,
}

impl SensorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device_name: "dht11".to_string(),
            iio_root: "/sys/bus/iio/devices".to_string(),
            poll_interval_ms: 2000,
        }
    }
}

/// Season configuration. `fixed` pins the season, otherwise the calendar decides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed: Option<Season>,
    pub summer_months: Vec<u32>,
    pub mid_season_months: Vec<u32>,
}

impl SeasonConfig {
    pub fn policy(&self) -> SeasonPolicy {
        match self.fixed {
            Some(season) => SeasonPolicy::fixed(season),
            None => SeasonPolicy::Calendar {
                summer_months: self.summer_months.clone(),
                mid_season_months: self.mid_season_months.clone(),
            },
        }
    }
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self {
            fixed: None,
            summer_months: vec![5, 6, 7, 8, 9],
            mid_season_months: Vec::new(),
        }
    }
}

/// Loop pacing and process behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub regulation_interval_ms: u64,
    pub join_timeout_ms: u64,
    pub stats_window_secs: u64,
    pub simulate: bool,
    pub headless: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_frames: Option<u64>,
    pub log_level: String,
}

impl RuntimeConfig {
    pub fn regulation_interval(&self) -> Duration {
        Duration::from_millis(self.regulation_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn stats_window(&self) -> Duration {
        Duration::from_secs(self.stats_window_secs)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            regulation_interval_ms: 1000,
            join_timeout_ms: 1000,
            stats_window_secs: 10,
            simulate: false,
            headless: false,
            max_frames: None,
            log_level: "info".to_string(),
        }
    }
}

/// Complete climasight configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimaConfig {
    pub detector: DetectorConfig,
    pub camera: CameraConfig,
    pub sensor: SensorConfig,
    pub season: SeasonConfig,
    pub runtime: RuntimeConfig,
    pub regulation: RegulationPolicy,
}

impl ClimaConfig {
    /// Load configuration from a JSON, TOML or YAML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path, e)))?;
        Self::from_str(&content)
    }

    /// Load configuration from string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        // Try JSON first
        if let Ok(config) = serde_json::from_str::<ClimaConfig>(content) {
            return Ok(config);
        }

        let toml_err = match toml::from_str::<ClimaConfig>(content) {
            Ok(config) => return Ok(config),
            Err(e) => e,
        };

        if let Ok(config) = serde_yaml::from_str::<ClimaConfig>(content) {
            return Ok(config);
        }

        Err(ConfigError::ParseError(format!(
            "not valid JSON, TOML or YAML (toml: {})",
            toml_err.message()
        )))
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `CLIMASIGHT_*` overrides from an arbitrary lookup. Unparsable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("CLIMASIGHT_MODEL") {
            self.detector.model_path = model;
        }
        if let Some(c) = lookup("CLIMASIGHT_CONFIDENCE").and_then(|v| v.parse().ok()) {
            self.detector.confidence = c;
        }
        if let Some(id) = lookup("CLIMASIGHT_CLASS_ID").and_then(|v| v.parse().ok()) {
            self.detector.class_id = id;
        }
        if let Some(id) = lookup("CLIMASIGHT_CAMERA_ID").and_then(|v| v.parse().ok()) {
            self.camera.camera_id = id;
        }
        if let Some(margin) = lookup("CLIMASIGHT_MARGIN").and_then(|v| v.parse().ok()) {
            self.regulation.margin = margin;
        }
        if let Some(season) = lookup("CLIMASIGHT_SEASON") {
            if season.eq_ignore_ascii_case("auto") {
                self.season.fixed = None;
            } else if let Ok(s) = season.parse::<Season>() {
                self.season.fixed = Some(s);
            }
        }
        if let Some(device) = lookup("CLIMASIGHT_SENSOR_DEVICE") {
            self.sensor.device_name = device;
        }
        if let Some(level) = lookup("CLIMASIGHT_LOG_LEVEL") {
            self.runtime.log_level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.detector;
        if !(0.0..=1.0).contains(&d.confidence) {
            return Err(ConfigError::ValidationError(format!(
                "detector.confidence must be within [0, 1], got {}",
                d.confidence
            )));
        }
        if !(0.0..=1.0).contains(&d.nms_iou) {
            return Err(ConfigError::ValidationError(
                "detector.nms_iou must be within [0, 1]".to_string(),
            ));
        }
        if d.input_size == 0 || d.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "detector.input_size and detector.poll_interval_ms must be > 0".to_string(),
            ));
        }

        let c = &self.camera;
        if c.width == 0 || c.height == 0 || c.target_fps == 0 {
            return Err(ConfigError::ValidationError(
                "camera resolution and target_fps must be > 0".to_string(),
            ));
        }

        if self.sensor.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "sensor.poll_interval_ms must be > 0".to_string(),
            ));
        }

        self.season
            .policy()
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("season: {}", e)))?;
        self.regulation
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("regulation: {}", e)))?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClimaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detector.model_path, "yolov8s.onnx");
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.regulation.margin, 0.5);
        assert_eq!(config.regulation.bands.len(), 4);
    }

    #[test]
    fn test_partial_toml() {
        let config = ClimaConfig::from_str(
            r#"
            [detector]
            confidence = 0.6

            [season]
            fixed = "winter"
            "#,
        )
        .unwrap();
        assert_eq!(config.detector.confidence, 0.6);
        assert_eq!(config.detector.class_id, 0);
        assert_eq!(config.season.policy(), SeasonPolicy::fixed(Season::Winter));
    }

    #[test]
    fn test_json_and_yaml() {
        let json = ClimaConfig::from_str(r#"{"camera": {"camera_id": 2}}"#).unwrap();
        assert_eq!(json.camera.camera_id, 2);

        let yaml =
            ClimaConfig::from_str("runtime:\n  simulate: true\n  join_timeout_ms: 250\n").unwrap();
        assert!(yaml.runtime.simulate);
        assert_eq!(yaml.runtime.join_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_toml_round_trip_keeps_tables() {
        let config = ClimaConfig::default();
        let text = config.to_toml().unwrap();
        let back = ClimaConfig::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[regulation]\nmargin = 1.0\nwatts_per_person = 80.0").unwrap();
        let config = ClimaConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.regulation.margin, 1.0);
        assert_eq!(config.regulation.watts_per_person, 80.0);
        assert_eq!(config.regulation.bands.len(), 4);
    }

    #[test]
    fn test_missing_file() {
        let err = ClimaConfig::from_file("/nonexistent/climasight.toml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CLIMASIGHT_CONFIDENCE", "0.7"),
            ("CLIMASIGHT_SEASON", "summer"),
            ("CLIMASIGHT_MARGIN", "not-a-number"),
            ("CLIMASIGHT_MODEL", "models/person.onnx"),
        ]
        .into_iter()
        .collect();
        let mut config = ClimaConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.detector.confidence, 0.7);
        assert_eq!(config.season.fixed, Some(Season::Summer));
        assert_eq!(config.regulation.margin, 0.5);
        assert_eq!(config.detector.model_path, "models/person.onnx");
    }

    #[test]
    fn test_env_overrides_layer_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[camera]\ncamera_id = 2\n\n[regulation]\nmargin = 1.0").unwrap();
        let mut config = ClimaConfig::from_file(file.path().to_str().unwrap()).unwrap();

        let vars: HashMap<&str, &str> = [("CLIMASIGHT_MARGIN", "0.25")].into_iter().collect();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.regulation.margin, 0.25);
        assert_eq!(config.camera.camera_id, 2);
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = ClimaConfig::default();
        config.detector.confidence = 1.5;
        assert!(config.validate().is_err());

        let mut config = ClimaConfig::default();
        config.camera.target_fps = 0;
        assert!(config.validate().is_err());

        let mut config = ClimaConfig::default();
        config.regulation.margin = -1.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("regulation"));

        let mut config = ClimaConfig::default();
        config.season.summer_months = vec![0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_error_into_core() {
        let err: Error = ConfigError::ValidationError("bad".to_string()).into();
        assert!(matches!(err, Error::Config(_)));
    }
}
