//! Low-frequency sensor polling

use climasight_core::{Result, Sensor, SharedState, StopSignal, WorkerHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Counters reported when the worker exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorSummary {
    pub readings: u64,
    pub failures: u64,
}

/// Polls a sensor every `interval` and publishes each good reading.
///
/// Failed reads are expected (the DHT11 misses often) and never clear the last good value.
pub struct SensorWorker {
    state: Arc<SharedState>,
    sensor: Box<dyn Sensor>,
    interval: Duration,
    stop: StopSignal,
}

impl SensorWorker {
    pub fn new(state: Arc<SharedState>, sensor: Box<dyn Sensor>, stop: StopSignal) -> Self {
        Self {
            state,
            sensor,
            interval: Duration::from_secs(2),
            stop,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn spawn(self) -> Result<WorkerHandle> {
        WorkerHandle::spawn("sensor", move || {
            self.run();
        })
    }

    pub fn run(mut self) -> SensorSummary {
        info!(
            "Sensor worker started ({}, every {:?})",
            self.sensor.name(),
            self.interval
        );
        let mut summary = SensorSummary::default();
        let mut consecutive_failures = 0u64;

        while !self.stop.is_triggered() {
            match self.sensor.poll() {
                Ok(reading) => {
                    if consecutive_failures > 0 {
                        debug!("Sensor recovered after {} failed reads", consecutive_failures);
                    }
                    consecutive_failures = 0;
                    debug!("Sensor reading: {}", reading);
                    self.state.publish_sensor(reading);
                    summary.readings += 1;
                }
                Err(e) => {
                    summary.failures += 1;
                    consecutive_failures += 1;
                    if consecutive_failures == 1 {
                        warn!("Sensor read failed: {}", e);
                    } else {
                        debug!("Sensor read failed ({} in a row): {}", consecutive_failures, e);
                    }
                }
            }
            if self.stop.sleep(self.interval) {
                break;
            }
        }

        info!(
            "Sensor worker stopped: {} readings, {} failures",
            summary.readings, summary.failures
        );
        summary
    }
}
