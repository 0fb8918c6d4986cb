use climasight_core::{Error, Sensor, SensorReading, SharedState, StopSignal};
use climasight_sc::SensorWorker;
use mockall::mock;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

mock! {
    pub Dht {}

    impl Sensor for Dht {
        fn poll(&mut self) -> climasight_core::Result<SensorReading>;
    }
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn test_unknown_until_first_good_read() {
    let mut sensor = MockDht::new();
    let mut calls = 0;
    sensor.expect_poll().returning(move || {
        calls += 1;
        if calls < 3 {
            Err(Error::Sensor("checksum mismatch".to_string()))
        } else {
            Ok(SensorReading::new(23.0, Some(40.0)))
        }
    });

    let state = Arc::new(SharedState::new());
    let stop = StopSignal::new();
    let handle = SensorWorker::new(state.clone(), Box::new(sensor), stop.clone())
        .with_interval(Duration::from_millis(5))
        .spawn()
        .unwrap();

    assert!(wait_until(|| state.read_sensor().is_some()));
    assert_eq!(state.read_sensor().unwrap().temperature_c, 23.0);

    stop.trigger();
    assert!(handle.join_timeout(Duration::from_secs(2)));
}

#[test]
fn test_failure_after_success_keeps_value() {
    let mut sensor = MockDht::new();
    let mut calls = 0;
    sensor.expect_poll().returning(move || {
        calls += 1;
        if calls == 1 {
            Ok(SensorReading::new(26.5, None))
        } else {
            Err(Error::Sensor("timeout".to_string()))
        }
    });

    let state = Arc::new(SharedState::new());
    let stop = StopSignal::new();
    let handle = {
        let state = state.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            SensorWorker::new(state, Box::new(sensor), stop)
                .with_interval(Duration::from_millis(5))
                .run()
        })
    };

    thread::sleep(Duration::from_millis(60));
    stop.trigger();
    let summary = handle.join().unwrap();
    assert_eq!(summary.readings, 1);
    assert!(summary.failures >= 1);
    assert_eq!(state.read_sensor().unwrap().temperature_c, 26.5);
}
