//! Temperature / humidity sources

use crate::error::SensorError;
use climasight_core::{Result, Sensor, SensorReading};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TEMP_FILE: &str = "in_temp_input";
const HUMIDITY_FILE: &str = "in_humidityrelative_input";

/// Plausible range for an indoor sensor, in °C. Anything outside is a bad read.
const TEMP_RANGE: std::ops::RangeInclusive<f64> = -40.0..=85.0;

/// Sensor exposed through the Linux Industrial I/O sysfs interface.
///
/// The `dht11` kernel driver reports `in_temp_input` in millidegrees Celsius and
/// `in_humidityrelative_input` in milli-percent. Reads fail transiently (EIO, timeouts)
/// when the single-wire protocol misses a bit; callers are expected to retry.
#[derive(Debug, Clone)]
pub struct IioSensor {
    device_dir: PathBuf,
    name: String,
}

impl IioSensor {
    /// Use a specific `iio:deviceN` directory.
    pub fn open(device_dir: impl Into<PathBuf>) -> std::result::Result<Self, SensorError> {
        let device_dir = device_dir.into();
        if !device_dir.join(TEMP_FILE).exists() {
            return Err(SensorError::NotFound(format!(
                "{} has no {}",
                device_dir.display(),
                TEMP_FILE
            )));
        }
        let name = fs::read_to_string(device_dir.join("name"))
            .map(|n| n.trim().to_string())
            .unwrap_or_else(|_| "iio".to_string());
        info!("Using IIO sensor '{}' at {}", name, device_dir.display());
        Ok(Self { device_dir, name })
    }

    /// Find the first device under `root` (normally `/sys/bus/iio/devices`) whose `name`
    /// file matches `driver_name`.
    pub fn discover(
        root: impl AsRef<Path>,
        driver_name: &str,
    ) -> std::result::Result<Self, SensorError> {
        let root = root.as_ref();
        let entries = fs::read_dir(root)
            .map_err(|e| SensorError::NotFound(format!("{}: {}", root.display(), e)))?;

        let mut devices: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with("iio:device"))
            })
            .collect();
        devices.sort();

        for dir in devices {
            match fs::read_to_string(dir.join("name")) {
                Ok(name) if name.trim() == driver_name => return Self::open(dir),
                Ok(name) => debug!("Skipping IIO device {} ({})", dir.display(), name.trim()),
                Err(_) => continue,
            }
        }
        Err(SensorError::NotFound(format!(
            "no '{}' device under {}",
            driver_name,
            root.display()
        )))
    }

    pub fn device_dir(&self) -> &Path {
        &self.device_dir
    }

    fn read_milli(&self, file: &str) -> std::result::Result<f64, SensorError> {
        let raw = fs::read_to_string(self.device_dir.join(file))?;
        let raw = raw.trim();
        let value: i64 = raw
            .parse()
            .map_err(|_| SensorError::Read(format!("{}: unparsable value '{}'", file, raw)))?;
        Ok(value as f64 / 1000.0)
    }

    fn read(&self) -> std::result::Result<SensorReading, SensorError> {
        let temperature = self.read_milli(TEMP_FILE)?;
        if !TEMP_RANGE.contains(&temperature) {
            return Err(SensorError::OutOfRange(format!("{:.1}°C", temperature)));
        }
        // Humidity is optional; some IIO sensors only expose temperature.
        let humidity = if self.device_dir.join(HUMIDITY_FILE).exists() {
            Some(self.read_milli(HUMIDITY_FILE)?)
        } else {
            None
        };
        Ok(SensorReading::new(temperature, humidity))
    }
}

impl Sensor for IioSensor {
    fn poll(&mut self) -> Result<SensorReading> {
        Ok(self.read()?)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Sensor that drifts between two temperature bounds, bouncing at each end.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    temperature: f64,
    humidity: f64,
    step: f64,
    bounds: (f64, f64),
    polls: u64,
    fail_every: Option<u64>,
}

impl SimulatedSensor {
    pub fn new(start: f64, bounds: (f64, f64), step: f64) -> Self {
        Self {
            temperature: start,
            humidity: 55.0,
            step,
            bounds,
            polls: 0,
            fail_every: None,
        }
    }

    /// Fail every `n`th poll, like a DHT11 missing a checksum.
    pub fn with_failures(mut self, every: u64) -> Self {
        self.fail_every = Some(every.max(1));
        self
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new(18.0, (16.0, 26.0), 0.3)
    }
}

impl Sensor for SimulatedSensor {
    fn poll(&mut self) -> Result<SensorReading> {
        self.polls += 1;
        if let Some(n) = self.fail_every {
            if self.polls % n == 0 {
                return Err(SensorError::Read("simulated checksum mismatch".to_string()).into());
            }
        }

        let reading = SensorReading::new(self.temperature, Some(self.humidity));

        let (lo, hi) = self.bounds;
        let next = self.temperature + self.step;
        if next > hi || next < lo {
            self.step = -self.step;
        }
        self.temperature += self.step;
        self.humidity = 55.0 + (self.temperature - lo) / (hi - lo).max(f64::EPSILON) * 20.0;

        Ok(reading)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
