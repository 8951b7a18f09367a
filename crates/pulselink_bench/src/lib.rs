//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use pulselink_protocol::{MotionKind, MotionValue, Sensor, Value};
use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Generate random blob data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a batch of random blobs.
pub fn random_blobs(count: usize, size: usize) -> Vec<Vec<u8>> {
    (0..count).map(|_| random_data(size)).collect()
}

/// Fixed recording start for generated sensors.
pub fn recording_start() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

/// Generate an accelerometer batch of `count` samples at 100 Hz.
pub fn accelerometer_batch(count: usize) -> Sensor {
    let start = recording_start();
    let mut rng = rand::thread_rng();
    let values = (0..count).map(|i| {
        let t = start + Duration::from_millis(i as u64 * 10);
        Value::from(MotionValue::new(
            t,
            rng.gen_range(-2.0..2.0),
            rng.gen_range(-2.0..2.0),
            rng.gen_range(-2.0..2.0),
        ))
    });
    Sensor::from_values(MotionKind::Accelerometer.into(), start, values)
        .expect("samples are generated in order")
}
