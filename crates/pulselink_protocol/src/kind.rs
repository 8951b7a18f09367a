//! Sensor family enumerations and their stable names.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Motion sensors sampled by the wearable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MotionKind {
    /// User acceleration.
    Accelerometer,
    /// Rotation rate.
    Gyroscope,
    /// Gravity vector.
    Gravity,
    /// Device attitude as a quaternion.
    Attitude,
    /// Calibrated magnetic field.
    Magnetometer,
}

/// Scalar statistics read from the health platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatisticKind {
    /// Beats per minute.
    HeartRate,
    /// Active energy in kilocalories.
    ActiveEnergy,
    /// Step count.
    StepCount,
}

/// Distance accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DistanceKind {
    /// Walking or running distance.
    WalkingRunning,
    /// Cycling distance.
    Cycling,
    /// Swimming distance.
    Swimming,
}

/// The tag of a [`crate::Sensor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SensorKind {
    /// A motion sensor.
    Motion(MotionKind),
    /// A scalar statistic.
    Statistic(StatisticKind),
    /// A distance accumulator.
    Distance(DistanceKind),
}

impl SensorKind {
    /// Every known sensor kind.
    pub const ALL: [SensorKind; 11] = [
        SensorKind::Motion(MotionKind::Accelerometer),
        SensorKind::Motion(MotionKind::Gyroscope),
        SensorKind::Motion(MotionKind::Gravity),
        SensorKind::Motion(MotionKind::Attitude),
        SensorKind::Motion(MotionKind::Magnetometer),
        SensorKind::Statistic(StatisticKind::HeartRate),
        SensorKind::Statistic(StatisticKind::ActiveEnergy),
        SensorKind::Statistic(StatisticKind::StepCount),
        SensorKind::Distance(DistanceKind::WalkingRunning),
        SensorKind::Distance(DistanceKind::Cycling),
        SensorKind::Distance(DistanceKind::Swimming),
    ];

    /// Stable name used as the stream key on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            SensorKind::Motion(MotionKind::Accelerometer) => "accelerometer",
            SensorKind::Motion(MotionKind::Gyroscope) => "gyroscope",
            SensorKind::Motion(MotionKind::Gravity) => "gravity",
            SensorKind::Motion(MotionKind::Attitude) => "attitude",
            SensorKind::Motion(MotionKind::Magnetometer) => "magnetometer",
            SensorKind::Statistic(StatisticKind::HeartRate) => "heart_rate",
            SensorKind::Statistic(StatisticKind::ActiveEnergy) => "active_energy",
            SensorKind::Statistic(StatisticKind::StepCount) => "step_count",
            SensorKind::Distance(DistanceKind::WalkingRunning) => "distance_walking_running",
            SensorKind::Distance(DistanceKind::Cycling) => "distance_cycling",
            SensorKind::Distance(DistanceKind::Swimming) => "distance_swimming",
        }
    }

    /// Parses a name produced by [`SensorKind::name`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownSensor`] for any other string.
    pub fn from_name(name: &str) -> ModelResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| ModelError::UnknownSensor {
                name: name.to_string(),
            })
    }

    /// Returns true for motion kinds.
    pub fn is_motion(&self) -> bool {
        matches!(self, SensorKind::Motion(_))
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<MotionKind> for SensorKind {
    fn from(kind: MotionKind) -> Self {
        SensorKind::Motion(kind)
    }
}

impl From<StatisticKind> for SensorKind {
    fn from(kind: StatisticKind) -> Self {
        SensorKind::Statistic(kind)
    }
}

impl From<DistanceKind> for SensorKind {
    fn from(kind: DistanceKind) -> Self {
        SensorKind::Distance(kind)
    }
}
