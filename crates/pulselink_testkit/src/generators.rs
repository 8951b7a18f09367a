//! Property-based test generators using proptest.

use proptest::prelude::*;
use pulselink_codec::WireEnvelope;
use pulselink_protocol::{
    DistanceValue, MotionValue, Sensor, SensorKind, StatisticValue, Value,
};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Strategy for opaque record blobs.
pub fn blob_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Strategy for a batch of blobs, as passed to `append_many`.
pub fn blob_batch_strategy(max_len: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(blob_strategy(), 0..=max_len)
}

/// Strategy for envelope keys: non-empty, ASCII, may contain `/`.
pub fn envelope_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_/]{0,31}").expect("Invalid regex")
}

/// Strategy for envelopes with arbitrary payloads.
pub fn envelope_strategy() -> impl Strategy<Value = WireEnvelope> {
    (envelope_key_strategy(), blob_strategy())
        .prop_map(|(key, payload)| WireEnvelope::new(key, payload))
}

/// Strategy for recording start times within a few years of 2023.
pub fn recording_start_strategy() -> impl Strategy<Value = SystemTime> {
    (1_600_000_000u64..1_800_000_000, 0u32..1_000_000_000)
        .prop_map(|(secs, nanos)| UNIX_EPOCH + Duration::new(secs, nanos))
}

/// Strategy for any known sensor kind.
pub fn sensor_kind_strategy() -> impl Strategy<Value = SensorKind> {
    prop::sample::select(SensorKind::ALL.to_vec())
}

/// Non-decreasing offsets from a start time, in milliseconds.
fn offsets_strategy(max_len: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..50, 0..=max_len).prop_map(|steps| {
        steps
            .into_iter()
            .scan(0u64, |acc, step| {
                *acc += step;
                Some(*acc)
            })
            .collect()
    })
}

fn finite() -> impl Strategy<Value = f64> {
    -1.0e6f64..1.0e6
}

/// Strategy for a sensor of `kind` with up to `max_len` well-ordered values.
pub fn sensor_of_kind_strategy(
    kind: SensorKind,
    max_len: usize,
) -> impl Strategy<Value = Sensor> {
    (
        recording_start_strategy(),
        offsets_strategy(max_len),
        prop::collection::vec((finite(), finite(), finite(), finite()), max_len),
    )
        .prop_map(move |(start, offsets, samples)| {
            let values = offsets.iter().zip(&samples).map(|(offset, &(a, b, c, d))| {
                let t = start + Duration::from_millis(*offset);
                value_for(kind, t, a, b, c, d)
            });
            Sensor::from_values(kind, start, values).expect("generated values are ordered")
        })
}

fn value_for(kind: SensorKind, t: SystemTime, a: f64, b: f64, c: f64, d: f64) -> Value {
    match kind {
        SensorKind::Motion(pulselink_protocol::MotionKind::Attitude) => {
            MotionValue::quaternion(t, a, b, c, d).into()
        }
        SensorKind::Motion(_) => MotionValue::new(t, a, b, c).into(),
        SensorKind::Statistic(_) => StatisticValue {
            timestamp: t,
            value: a,
        }
        .into(),
        SensorKind::Distance(_) => DistanceValue {
            timestamp: t,
            meters: a.abs(),
        }
        .into(),
    }
}

/// Strategy for a sensor of any kind with up to `max_len` values.
pub fn sensor_strategy(max_len: usize) -> impl Strategy<Value = Sensor> {
    sensor_kind_strategy().prop_flat_map(move |kind| sensor_of_kind_strategy(kind, max_len))
}

/// An operation against a pending store, for model-based tests.
#[derive(Debug, Clone)]
pub enum StoreOperation {
    /// Append one blob.
    Append(Vec<u8>),
    /// Append several blobs as one entry.
    AppendMany(Vec<Vec<u8>>),
    /// Remove the records at these positions of `list_ids()`, modulo its length.
    Remove(Vec<usize>),
    /// Remove everything.
    Clear,
    /// Rewrite the log.
    Compact,
    /// Close and reopen the store.
    Reopen,
}

/// Strategy for store operations, weighted towards appends.
pub fn store_operation_strategy() -> impl Strategy<Value = StoreOperation> {
    prop_oneof![
        4 => blob_strategy().prop_map(StoreOperation::Append),
        2 => blob_batch_strategy(8).prop_map(StoreOperation::AppendMany),
        3 => prop::collection::vec(any::<usize>(), 1..4).prop_map(StoreOperation::Remove),
        1 => Just(StoreOperation::Clear),
        1 => Just(StoreOperation::Compact),
        1 => Just(StoreOperation::Reopen),
    ]
}

/// Strategy for a sequence of store operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<StoreOperation>> {
    prop::collection::vec(store_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn generated_sensors_are_ordered(sensor in sensor_strategy(64)) {
            let values = sensor.values();
            prop_assert!(values.len() <= 64);
            prop_assert!(values.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
            prop_assert!(values.iter().all(|v| v.timestamp() >= sensor.recording_start()));
        }

        #[test]
        fn generated_keys_encode(envelope in envelope_strategy()) {
            prop_assert!(!envelope.key.is_empty());
            prop_assert!(envelope.encode().is_ok());
        }
    }
}
