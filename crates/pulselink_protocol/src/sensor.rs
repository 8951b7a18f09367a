//! The tagged sensor batch.

use crate::error::{ModelError, ModelResult};
use crate::kind::{DistanceKind, MotionKind, SensorKind, StatisticKind};
use crate::value::{DistanceValue, MotionValue, StatisticValue, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::time::SystemTime;

/// A batch of samples from one named sensor, tagged with its recording start.
///
/// Each variant stores values of its own type, so a sensor can never hold
/// samples of a foreign variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Sensor {
    /// Motion samples.
    Motion {
        /// Which motion sensor.
        kind: MotionKind,
        /// Start of the recording these samples belong to.
        recording_start: SystemTime,
        /// Samples in capture order.
        values: Vec<MotionValue>,
    },
    /// Scalar statistic samples.
    Statistic {
        /// Which statistic.
        kind: StatisticKind,
        /// Start of the recording these samples belong to.
        recording_start: SystemTime,
        /// Samples in capture order.
        values: Vec<StatisticValue>,
    },
    /// Distance samples.
    Distance {
        /// Which distance accumulator.
        kind: DistanceKind,
        /// Start of the recording these samples belong to.
        recording_start: SystemTime,
        /// Samples in capture order.
        values: Vec<DistanceValue>,
    },
}

impl Sensor {
    /// Creates an empty sensor of `kind`.
    pub fn empty(kind: SensorKind, recording_start: SystemTime) -> Self {
        match kind {
            SensorKind::Motion(kind) => Sensor::Motion {
                kind,
                recording_start,
                values: Vec::new(),
            },
            SensorKind::Statistic(kind) => Sensor::Statistic {
                kind,
                recording_start,
                values: Vec::new(),
            },
            SensorKind::Distance(kind) => Sensor::Distance {
                kind,
                recording_start,
                values: Vec::new(),
            },
        }
    }

    /// Builds a sensor from loose values, as delivered by a capture callback.
    ///
    /// # Errors
    ///
    /// Fails with [`ModelError::ValueMismatch`] or
    /// [`ModelError::NonMonotonicTimestamp`], see [`Sensor::push`].
    pub fn from_values(
        kind: SensorKind,
        recording_start: SystemTime,
        values: impl IntoIterator<Item = Value>,
    ) -> ModelResult<Self> {
        let mut sensor = Self::empty(kind, recording_start);
        for value in values {
            sensor.push(value)?;
        }
        Ok(sensor)
    }

    /// Returns the tag.
    pub fn kind(&self) -> SensorKind {
        match self {
            Sensor::Motion { kind, .. } => SensorKind::Motion(*kind),
            Sensor::Statistic { kind, .. } => SensorKind::Statistic(*kind),
            Sensor::Distance { kind, .. } => SensorKind::Distance(*kind),
        }
    }

    /// Returns the stable sensor name.
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Returns the recording start.
    pub fn recording_start(&self) -> SystemTime {
        match self {
            Sensor::Motion {
                recording_start, ..
            }
            | Sensor::Statistic {
                recording_start, ..
            }
            | Sensor::Distance {
                recording_start, ..
            } => *recording_start,
        }
    }

    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        match self {
            Sensor::Motion { values, .. } => values.len(),
            Sensor::Statistic { values, .. } => values.len(),
            Sensor::Distance { values, .. } => values.len(),
        }
    }

    /// Returns true if the sensor holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the samples as loose values.
    pub fn values(&self) -> Vec<Value> {
        match self {
            Sensor::Motion { values, .. } => values.iter().copied().map(Value::from).collect(),
            Sensor::Statistic { values, .. } => values.iter().copied().map(Value::from).collect(),
            Sensor::Distance { values, .. } => values.iter().copied().map(Value::from).collect(),
        }
    }

    fn last_timestamp(&self) -> Option<SystemTime> {
        match self {
            Sensor::Motion { values, .. } => values.last().map(|v| v.timestamp),
            Sensor::Statistic { values, .. } => values.last().map(|v| v.timestamp),
            Sensor::Distance { values, .. } => values.last().map(|v| v.timestamp),
        }
    }

    /// Appends a sample.
    ///
    /// # Errors
    ///
    /// - [`ModelError::ValueMismatch`] if `value` is not this sensor's variant
    /// - [`ModelError::NonMonotonicTimestamp`] if `value` is older than the last sample
    pub fn push(&mut self, value: Value) -> ModelResult<()> {
        let accepts = matches!(
            (self.kind(), &value),
            (SensorKind::Motion(_), Value::Motion(_))
                | (SensorKind::Statistic(_), Value::Statistic(_))
                | (SensorKind::Distance(_), Value::Distance(_))
        );
        if !accepts {
            return Err(ModelError::ValueMismatch {
                sensor: self.name().to_string(),
                value: value.variant_name(),
            });
        }
        if self.last_timestamp().is_some_and(|last| value.timestamp() < last) {
            return Err(ModelError::NonMonotonicTimestamp {
                sensor: self.name().to_string(),
            });
        }

        match (self, value) {
            (Sensor::Motion { values, .. }, Value::Motion(v)) => values.push(v),
            (Sensor::Statistic { values, .. }, Value::Statistic(v)) => values.push(v),
            (Sensor::Distance { values, .. }, Value::Distance(v)) => values.push(v),
            _ => unreachable!("variant checked above"),
        }
        Ok(())
    }

    /// Concatenates two batches of the same sensor.
    ///
    /// The result starts at the earlier of the two recording starts and holds
    /// `self`'s values followed by `other`'s.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::IncompatibleSensors`] if the kinds differ.
    pub fn merge(self, other: Sensor) -> ModelResult<Sensor> {
        let start = self.recording_start().min(other.recording_start());
        match (self, other) {
            (
                Sensor::Motion {
                    kind, mut values, ..
                },
                Sensor::Motion {
                    kind: other_kind,
                    values: tail,
                    ..
                },
            ) if kind == other_kind => {
                values.extend(tail);
                Ok(Sensor::Motion {
                    kind,
                    recording_start: start,
                    values,
                })
            }
            (
                Sensor::Statistic {
                    kind, mut values, ..
                },
                Sensor::Statistic {
                    kind: other_kind,
                    values: tail,
                    ..
                },
            ) if kind == other_kind => {
                values.extend(tail);
                Ok(Sensor::Statistic {
                    kind,
                    recording_start: start,
                    values,
                })
            }
            (
                Sensor::Distance {
                    kind, mut values, ..
                },
                Sensor::Distance {
                    kind: other_kind,
                    values: tail,
                    ..
                },
            ) if kind == other_kind => {
                values.extend(tail);
                Ok(Sensor::Distance {
                    kind,
                    recording_start: start,
                    values,
                })
            }
            (left, right) => Err(ModelError::IncompatibleSensors {
                left: left.name().to_string(),
                right: right.name().to_string(),
            }),
        }
    }

    /// Returns a copy holding only the samples in `range`.
    fn fragment(&self, range: Range<usize>) -> Sensor {
        match self {
            Sensor::Motion {
                kind,
                recording_start,
                values,
            } => Sensor::Motion {
                kind: *kind,
                recording_start: *recording_start,
                values: values[range].to_vec(),
            },
            Sensor::Statistic {
                kind,
                recording_start,
                values,
            } => Sensor::Statistic {
                kind: *kind,
                recording_start: *recording_start,
                values: values[range].to_vec(),
            },
            Sensor::Distance {
                kind,
                recording_start,
                values,
            } => Sensor::Distance {
                kind: *kind,
                recording_start: *recording_start,
                values: values[range].to_vec(),
            },
        }
    }

    /// Splits the batch into fragments of at most `size` samples.
    ///
    /// Only motion sensors are split. A batch shorter than `size`, and every
    /// non-motion batch, comes back as a single fragment equal to the
    /// original. A `size` of zero is treated as one.
    ///
    /// The iterator is lazy and `Clone`; cloning it restarts nothing but lets
    /// a caller walk the same fragments again.
    pub fn chunked(&self, size: usize) -> Chunks<'_> {
        let size = size.max(1);
        let whole = !self.kind().is_motion() || self.len() < size;
        Chunks {
            sensor: self,
            size: if whole { usize::MAX } else { size },
            pos: 0,
            done: false,
        }
    }

    /// Serializes the sensor to a CBOR payload.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Payload`] if serialization fails.
    pub fn to_payload(&self) -> ModelResult<Vec<u8>> {
        let mut out = Vec::with_capacity(16 + self.len() * 48);
        ciborium::into_writer(self, &mut out).map_err(|e| ModelError::payload(e.to_string()))?;
        Ok(out)
    }

    /// Parses a payload written by [`Sensor::to_payload`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Payload`] for malformed or trailing bytes.
    pub fn from_payload(bytes: &[u8]) -> ModelResult<Self> {
        let mut reader = bytes;
        let sensor: Sensor =
            ciborium::from_reader(&mut reader).map_err(|e| ModelError::payload(e.to_string()))?;
        if !reader.is_empty() {
            return Err(ModelError::payload(format!(
                "{} trailing bytes after sensor",
                reader.len()
            )));
        }
        Ok(sensor)
    }
}

/// Iterator returned by [`Sensor::chunked`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    sensor: &'a Sensor,
    size: usize,
    pos: usize,
    done: bool,
}

impl Iterator for Chunks<'_> {
    type Item = Sensor;

    fn next(&mut self) -> Option<Sensor> {
        if self.done {
            return None;
        }

        let len = self.sensor.len();
        if self.size == usize::MAX {
            self.done = true;
            return Some(self.sensor.clone());
        }

        let end = self.pos.saturating_add(self.size).min(len);
        let fragment = self.sensor.fragment(self.pos..end);
        self.pos = end;
        if self.pos >= len {
            self.done = true;
        }
        Some(fragment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.done {
            0
        } else if self.size == usize::MAX {
            1
        } else {
            (self.sensor.len() - self.pos).div_ceil(self.size)
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks<'_> {}

/// Returns one empty sensor per known kind, keyed by sensor name.
///
/// Used to seed receiver state before any data arrives.
pub fn empty_sensor_of_each(recording_start: SystemTime) -> BTreeMap<String, Sensor> {
    SensorKind::ALL
        .iter()
        .map(|kind| (kind.name().to_string(), Sensor::empty(*kind, recording_start)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn at(ms: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(ms)
    }

    fn accel(start_ms: u64, timestamps: impl IntoIterator<Item = u64>) -> Sensor {
        Sensor::from_values(
            MotionKind::Accelerometer.into(),
            at(start_ms),
            timestamps
                .into_iter()
                .map(|t| MotionValue::new(at(t), t as f64, 0.5, -1.0).into()),
        )
        .unwrap()
    }

    fn heart_rate(start_ms: u64, bpm: &[f64]) -> Sensor {
        Sensor::from_values(
            StatisticKind::HeartRate.into(),
            at(start_ms),
            bpm.iter().enumerate().map(|(i, &value)| {
                StatisticValue {
                    timestamp: at(start_ms + i as u64 * 1000),
                    value,
                }
                .into()
            }),
        )
        .unwrap()
    }

    #[test]
    fn merge_keeps_earlier_start_and_order() {
        let a = accel(2_000, [2_000, 2_010]);
        let b = accel(1_000, [2_020]);
        let merged = a.clone().merge(b.clone()).unwrap();

        assert_eq!(merged.recording_start(), at(1_000));
        let mut expected = a.values();
        expected.extend(b.values());
        assert_eq!(merged.values(), expected);
    }

    #[test]
    fn merge_of_different_kinds_fails() {
        let err = accel(0, [1]).merge(heart_rate(0, &[80.0])).unwrap_err();
        assert_eq!(
            err,
            ModelError::IncompatibleSensors {
                left: "accelerometer".into(),
                right: "heart_rate".into()
            }
        );

        let gyro = Sensor::empty(MotionKind::Gyroscope.into(), at(0));
        assert!(accel(0, [1]).merge(gyro).is_err());
    }

    #[test]
    fn push_rejects_foreign_variant() {
        let mut sensor = accel(0, []);
        let err = sensor
            .push(
                DistanceValue {
                    timestamp: at(5),
                    meters: 1.0,
                }
                .into(),
            )
            .unwrap_err();
        assert!(matches!(err, ModelError::ValueMismatch { value: "distance", .. }));
        assert!(sensor.is_empty());
    }

    #[test]
    fn push_rejects_time_going_backwards() {
        let mut sensor = accel(0, [10, 20]);
        let err = sensor
            .push(MotionValue::new(at(15), 0.0, 0.0, 0.0).into())
            .unwrap_err();
        assert!(matches!(err, ModelError::NonMonotonicTimestamp { .. }));

        // Equal timestamps are allowed.
        sensor
            .push(MotionValue::new(at(20), 0.0, 0.0, 0.0).into())
            .unwrap();
        assert_eq!(sensor.len(), 3);
    }

    #[test]
    fn short_batch_is_one_unmodified_fragment() {
        let sensor = accel(0, 0..3);
        let fragments: Vec<_> = sensor.chunked(10).collect();
        assert_eq!(fragments, vec![sensor]);
    }

    #[test]
    fn empty_batch_is_one_fragment() {
        let sensor = accel(0, []);
        assert_eq!(sensor.chunked(4).count(), 1);
    }

    #[test]
    fn statistics_are_never_split() {
        let sensor = heart_rate(0, &[70.0, 71.0, 72.0, 73.0, 74.0]);
        let fragments: Vec<_> = sensor.chunked(2).collect();
        assert_eq!(fragments, vec![sensor]);
    }

    #[test]
    fn chunks_can_be_walked_twice() {
        let sensor = accel(0, 0..25);
        let chunks = sensor.chunked(10);
        let first: Vec<_> = chunks.clone().collect();
        let second: Vec<_> = chunks.collect();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert_eq!(first[2].len(), 5);
    }

    #[test]
    fn zero_size_means_one_value_per_fragment() {
        let sensor = accel(0, 0..4);
        assert_eq!(sensor.chunked(0).count(), 4);
    }

    #[test]
    fn empty_sensor_of_each_covers_every_kind() {
        let seeded = empty_sensor_of_each(at(42));
        assert_eq!(seeded.len(), SensorKind::ALL.len());
        for (name, sensor) in &seeded {
            assert_eq!(name, sensor.name());
            assert!(sensor.is_empty());
            assert_eq!(sensor.recording_start(), at(42));
        }
        assert!(seeded.contains_key("attitude"));
    }

    #[test]
    fn payload_roundtrip_keeps_quaternions() {
        let mut sensor = Sensor::empty(MotionKind::Attitude.into(), at(0));
        sensor
            .push(MotionValue::quaternion(at(1), 0.1, 0.2, 0.3, 0.9).into())
            .unwrap();
        let bytes = sensor.to_payload().unwrap();
        assert_eq!(Sensor::from_payload(&bytes).unwrap(), sensor);
    }

    #[test]
    fn garbage_payload_fails() {
        assert!(matches!(
            Sensor::from_payload(&[0xff, 0x13, 0x00]),
            Err(ModelError::Payload { .. })
        ));

        let mut bytes = heart_rate(0, &[60.0]).to_payload().unwrap();
        bytes.push(0);
        assert!(Sensor::from_payload(&bytes).is_err());
    }

    proptest! {
        #[test]
        fn chunking_preserves_values(k in 0usize..200, n in 1usize..40) {
            let sensor = accel(0, 0..k as u64);
            let fragments: Vec<_> = sensor.chunked(n).collect();

            let expected = if k < n { 1 } else { k.div_ceil(n) };
            prop_assert_eq!(fragments.len(), expected);

            let mut rebuilt = Vec::new();
            for fragment in &fragments {
                prop_assert!(fragment.len() <= n);
                prop_assert_eq!(fragment.kind(), sensor.kind());
                prop_assert_eq!(fragment.recording_start(), sensor.recording_start());
                rebuilt.extend(fragment.values());
            }
            prop_assert_eq!(rebuilt, sensor.values());
        }

        #[test]
        fn merge_concatenates(a in 0u64..50, b in 0u64..50, sa in 0u64..1000, sb in 0u64..1000) {
            let left = accel(sa, 0..a);
            let right = accel(sb, 100..100 + b);
            let merged = left.clone().merge(right.clone()).unwrap();

            let mut expected = left.values();
            expected.extend(right.values());
            prop_assert_eq!(merged.values(), expected);
            prop_assert_eq!(merged.recording_start(), at(sa.min(sb)));
        }
    }
}
