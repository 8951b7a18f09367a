//! # PulseLink Protocol
//!
//! Typed sensor samples and the tagged [`Sensor`] batch that carries them
//! between the wearable and the phone.
//!
//! This crate provides:
//! - [`Value`] samples: motion (3 or 4 axes), scalar statistics, distance
//! - [`SensorKind`] tags with stable wire names
//! - [`Sensor`] batches with merge, chunking and CBOR payload encoding
//!
//! This is a pure data crate with no I/O.
//!
//! ```
//! use pulselink_protocol::{MotionKind, MotionValue, Sensor};
//! use std::time::{Duration, UNIX_EPOCH};
//!
//! let start = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
//! let mut accel = Sensor::empty(MotionKind::Accelerometer.into(), start);
//! for i in 0..250 {
//!     let t = start + Duration::from_millis(i * 10);
//!     accel.push(MotionValue::new(t, 0.0, 0.0, 1.0).into()).unwrap();
//! }
//! assert_eq!(accel.chunked(100).count(), 3);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod kind;
mod sensor;
mod value;

pub use error::{ModelError, ModelResult};
pub use kind::{DistanceKind, MotionKind, SensorKind, StatisticKind};
pub use sensor::{empty_sensor_of_each, Chunks, Sensor};
pub use value::{DistanceValue, MotionValue, StatisticValue, Value};
