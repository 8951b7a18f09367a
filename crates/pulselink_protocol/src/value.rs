//! Timestamped sample records.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// One motion sample: three axes, plus `w` for quaternion attitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionValue {
    /// When the sample was taken.
    pub timestamp: SystemTime,
    /// X axis.
    pub x: f64,
    /// Y axis.
    pub y: f64,
    /// Z axis.
    pub z: f64,
    /// Scalar part of a quaternion; `None` for plain vectors.
    pub w: Option<f64>,
}

impl MotionValue {
    /// Creates a three-axis sample.
    pub fn new(timestamp: SystemTime, x: f64, y: f64, z: f64) -> Self {
        Self {
            timestamp,
            x,
            y,
            z,
            w: None,
        }
    }

    /// Creates a quaternion sample.
    pub fn quaternion(timestamp: SystemTime, x: f64, y: f64, z: f64, w: f64) -> Self {
        Self {
            timestamp,
            x,
            y,
            z,
            w: Some(w),
        }
    }
}

/// A scalar statistic such as heart rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticValue {
    /// When the sample was taken.
    pub timestamp: SystemTime,
    /// Sample value in the statistic's unit.
    pub value: f64,
}

/// A cumulative distance reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceValue {
    /// When the sample was taken.
    pub timestamp: SystemTime,
    /// Distance in meters.
    pub meters: f64,
}

/// A typed, timestamped sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Motion sample.
    Motion(MotionValue),
    /// Scalar statistic sample.
    Statistic(StatisticValue),
    /// Distance sample.
    Distance(DistanceValue),
}

impl Value {
    /// Returns the sample timestamp.
    pub fn timestamp(&self) -> SystemTime {
        match self {
            Value::Motion(v) => v.timestamp,
            Value::Statistic(v) => v.timestamp,
            Value::Distance(v) => v.timestamp,
        }
    }

    /// Returns the variant name, used in error messages.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Value::Motion(_) => "motion",
            Value::Statistic(_) => "statistic",
            Value::Distance(_) => "distance",
        }
    }
}

impl From<MotionValue> for Value {
    fn from(v: MotionValue) -> Self {
        Value::Motion(v)
    }
}

impl From<StatisticValue> for Value {
    fn from(v: StatisticValue) -> Self {
        Value::Statistic(v)
    }
}

impl From<DistanceValue> for Value {
    fn from(v: DistanceValue) -> Self {
        Value::Distance(v)
    }
}
