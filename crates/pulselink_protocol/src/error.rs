//! Error types for the sensor model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by [`crate::Sensor`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Two sensors of different kinds cannot be merged.
    #[error("cannot merge sensor {left} with sensor {right}")]
    IncompatibleSensors {
        /// Name of the left-hand sensor.
        left: String,
        /// Name of the right-hand sensor.
        right: String,
    },

    /// A value of the wrong variant was offered to a sensor.
    #[error("sensor {sensor} does not accept {value} values")]
    ValueMismatch {
        /// Name of the sensor.
        sensor: String,
        /// Variant of the rejected value.
        value: &'static str,
    },

    /// A value would move the stream backwards in time.
    #[error("timestamp of sensor {sensor} went backwards")]
    NonMonotonicTimestamp {
        /// Name of the sensor.
        sensor: String,
    },

    /// A payload could not be serialized or parsed.
    #[error("sensor payload error: {message}")]
    Payload {
        /// Description of the failure.
        message: String,
    },

    /// A sensor name does not match any known kind.
    #[error("unknown sensor name: {name}")]
    UnknownSensor {
        /// The unrecognized name.
        name: String,
    },
}

impl ModelError {
    /// Create a payload error.
    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload {
            message: message.into(),
        }
    }
}
