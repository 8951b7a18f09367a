//! Test fixtures and store helpers.
//!
//! Provides throwaway pending stores, in memory or in a temporary
//! directory, plus a few ready-made scenarios.

use pulselink_core::{PendingStore, StoreConfig};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: PendingStore,
    config: StoreConfig,
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        Self {
            store: PendingStore::open_in_memory().expect("Failed to open in-memory store"),
            config: StoreConfig::default(),
            _temp_dir: None,
        }
    }

    /// Creates a new store in a fresh temporary directory.
    pub fn file() -> Self {
        Self::file_with_config(StoreConfig::default())
    }

    /// Creates a file-backed store with a custom configuration.
    pub fn file_with_config(config: StoreConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = PendingStore::open(temp_dir.path().join("store"), config.clone())
            .expect("Failed to open file store");
        Self {
            store,
            config,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store directory if file-based, `None` if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.store.path()
    }

    /// Closes the store and opens it again from disk.
    ///
    /// # Panics
    ///
    /// Panics for in-memory stores, which do not survive a close.
    pub fn reopen(self) -> Self {
        let Self {
            store,
            config,
            _temp_dir,
        } = self;
        let path = store
            .path()
            .expect("Only file-backed stores can be reopened");
        drop(store);

        let store = PendingStore::open(&path, config.clone()).expect("Failed to reopen store");
        Self {
            store,
            config,
            _temp_dir,
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = PendingStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
///
/// # Example
///
/// ```
/// use pulselink_testkit::with_temp_store;
///
/// with_temp_store(|store| {
///     let id = store.append(b"sample").unwrap();
///     assert!(store.contains(id));
/// });
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&PendingStore) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Runs a test with a file-backed store and its directory.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&PendingStore, &Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store
        .path()
        .expect("File store should have a path");
    f(&test_store.store, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use pulselink_core::RecordId;
    use pulselink_protocol::{
        DistanceValue, MotionValue, Sensor, SensorKind, StatisticValue, Value,
    };
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    /// A fixed recording start used by the scenarios.
    pub fn recording_start() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    /// Builds a sensor of `kind` holding `count` samples 10 ms apart.
    pub fn sample_sensor(kind: SensorKind, count: usize, start: SystemTime) -> Sensor {
        let values = (0..count).map(|i| {
            let t = start + Duration::from_millis(i as u64 * 10);
            let v = i as f64;
            match kind {
                SensorKind::Motion(pulselink_protocol::MotionKind::Attitude) => {
                    Value::from(MotionValue::quaternion(t, v, 0.0, 0.0, 1.0))
                }
                SensorKind::Motion(_) => MotionValue::new(t, v, -v, 1.0).into(),
                SensorKind::Statistic(_) => StatisticValue {
                    timestamp: t,
                    value: 60.0 + v,
                }
                .into(),
                SensorKind::Distance(_) => DistanceValue {
                    timestamp: t,
                    meters: v * 1.5,
                }
                .into(),
            }
        });
        Sensor::from_values(kind, start, values).expect("Generated samples are ordered")
    }

    /// Creates a store holding `record_count` numbered records.
    pub fn populated_store(record_count: usize) -> (TestStore, Vec<RecordId>) {
        let test_store = TestStore::memory();
        let blobs: Vec<Vec<u8>> = (0..record_count)
            .map(|i| format!("record-{i}").into_bytes())
            .collect();
        let ids = test_store
            .append_many(&blobs)
            .expect("Failed to populate store");
        (test_store, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulselink_protocol::{MotionKind, SensorKind, StatisticKind};

    #[test]
    fn memory_store_has_no_path() {
        let store = TestStore::memory();
        assert!(store.path().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn file_store_survives_reopen() {
        let store = TestStore::file();
        let id = store.append(b"persisted").unwrap();
        let store_id = store.store_id();

        let store = store.reopen();
        assert_eq!(store.store_id(), store_id);
        assert_eq!(store.get_one(id).unwrap(), b"persisted");
    }

    #[test]
    fn with_file_store_passes_directory() {
        with_file_store(|store, path| {
            assert!(path.join("pending.log").exists());
            store.append(b"x").unwrap();
        });
    }

    #[test]
    fn populated_scenario() {
        let (store, ids) = scenarios::populated_store(10);
        assert_eq!(store.list_ids(), ids);
        assert_eq!(store.get_one(ids[3]).unwrap(), b"record-3");
    }

    #[test]
    fn sample_sensors_match_kind() {
        let start = scenarios::recording_start();
        let attitude = scenarios::sample_sensor(MotionKind::Attitude.into(), 5, start);
        assert_eq!(attitude.len(), 5);
        assert_eq!(attitude.kind(), SensorKind::Motion(MotionKind::Attitude));

        let heart = scenarios::sample_sensor(StatisticKind::HeartRate.into(), 0, start);
        assert!(heart.is_empty());
    }
}
