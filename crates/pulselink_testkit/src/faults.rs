//! Fault injection for storage backends.

use pulselink_storage::{StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Faults {
    fail_appends: AtomicBool,
    fail_sync: AtomicBool,
    fail_replace: AtomicBool,
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            fail_appends: AtomicBool::new(false),
            fail_sync: AtomicBool::new(false),
            fail_replace: AtomicBool::new(false),
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
        }
    }
}

/// Controls the faults of a [`FaultyBackend`] after it has been handed
/// to a store.
#[derive(Debug, Clone)]
pub struct FaultHandle(Arc<Faults>);

impl FaultHandle {
    /// Makes every append fail cleanly (nothing written).
    pub fn set_fail_appends(&self, fail: bool) {
        self.0.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Makes every sync fail.
    pub fn set_fail_sync(&self, fail: bool) {
        self.0.fail_sync.store(fail, Ordering::SeqCst);
    }

    /// Makes every replace fail, leaving the old image.
    pub fn set_fail_replace(&self, fail: bool) {
        self.0.fail_replace.store(fail, Ordering::SeqCst);
    }

    /// Simulates power loss once `bytes` more bytes have been appended.
    ///
    /// The append that crosses the limit is written partially. From then
    /// on every mutating call fails, as if the process had died.
    pub fn crash_after(&self, bytes: usize) {
        self.0.bytes_written.store(0, Ordering::SeqCst);
        self.0.crash_after_bytes.store(bytes, Ordering::SeqCst);
    }

    /// Returns whether the simulated crash has happened.
    pub fn has_crashed(&self) -> bool {
        self.0.crashed.load(Ordering::SeqCst)
    }

    /// Clears every fault.
    pub fn reset(&self) {
        self.set_fail_appends(false);
        self.set_fail_sync(false);
        self.set_fail_replace(false);
        self.0.crash_after_bytes.store(usize::MAX, Ordering::SeqCst);
        self.0.bytes_written.store(0, Ordering::SeqCst);
        self.0.crashed.store(false, Ordering::SeqCst);
    }
}

/// A backend wrapper that fails on demand.
pub struct FaultyBackend {
    inner: Box<dyn StorageBackend>,
    faults: Arc<Faults>,
}

impl FaultyBackend {
    /// Wraps `inner` with all faults off.
    pub fn new(inner: Box<dyn StorageBackend>) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    /// Returns a handle for switching faults on and off.
    pub fn handle(&self) -> FaultHandle {
        FaultHandle(Arc::clone(&self.faults))
    }

    fn crashed(&self) -> StorageResult<()> {
        if self.faults.crashed.load(Ordering::SeqCst) {
            return Err(injected("backend crashed"));
        }
        Ok(())
    }
}

fn injected(message: &str) -> StorageError {
    StorageError::Io(io::Error::new(io::ErrorKind::Other, message))
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        self.crashed()?;
        if self.faults.fail_appends.load(Ordering::SeqCst) {
            return Err(injected("injected append failure"));
        }

        let written = self.faults.bytes_written.fetch_add(data.len(), Ordering::SeqCst);
        let limit = self.faults.crash_after_bytes.load(Ordering::SeqCst);
        if written.saturating_add(data.len()) > limit {
            self.faults.crashed.store(true, Ordering::SeqCst);
            let partial = limit.saturating_sub(written).min(data.len());
            if partial > 0 {
                self.inner.append(&data[..partial])?;
                self.inner.sync()?;
            }
            return Err(injected("simulated crash during append"));
        }

        self.inner.append(data)
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.crashed()?;
        if self.faults.fail_sync.load(Ordering::SeqCst) {
            return Err(injected("injected sync failure"));
        }
        self.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.crashed()?;
        self.inner.truncate(new_size)
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        self.crashed()?;
        if self.faults.fail_replace.load(Ordering::SeqCst) {
            return Err(injected("injected replace failure"));
        }
        self.inner.replace(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulselink_core::{CoreError, PendingStore, StoreConfig};
    use pulselink_storage::{FileBackend, InMemoryBackend};
    use tempfile::tempdir;

    fn faulty_store() -> (PendingStore, FaultHandle) {
        let backend = FaultyBackend::new(Box::new(InMemoryBackend::new()));
        let handle = backend.handle();
        let store = PendingStore::open_with_backend(Box::new(backend), StoreConfig::default())
            .expect("open store");
        (store, handle)
    }

    #[test]
    fn failed_append_stores_nothing() {
        let (store, faults) = faulty_store();
        let kept = store.append(b"kept").unwrap();

        faults.set_fail_appends(true);
        assert!(matches!(store.append(b"lost"), Err(CoreError::Storage(_))));
        assert_eq!(store.list_ids(), vec![kept]);

        faults.reset();
        let next = store.append(b"next").unwrap();
        assert_eq!(store.list_ids(), vec![kept, next]);
    }

    #[test]
    fn failed_sync_rolls_back_the_entry() {
        let (store, faults) = faulty_store();
        let size = store.log_size();

        faults.set_fail_sync(true);
        assert!(store.append_many(&[b"a", b"b"]).is_err());
        assert!(store.is_empty());
        assert_eq!(store.log_size(), size);
    }

    #[test]
    fn failed_remove_keeps_records() {
        let (store, faults) = faulty_store();
        let ids = store.append_many(&[b"a", b"b"]).unwrap();

        faults.set_fail_appends(true);
        assert!(store.remove(&ids).is_err());
        assert_eq!(store.list_ids(), ids);
    }

    #[test]
    fn failed_compaction_keeps_old_log() {
        let (store, faults) = faulty_store();
        let ids = store.append_many(&[b"a", b"b", b"c"]).unwrap();
        store.remove(&ids[..1]).unwrap();

        faults.set_fail_replace(true);
        assert!(store.compact().is_err());
        assert_eq!(store.get(&ids[1..]).unwrap(), vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn crash_mid_append_leaves_torn_tail_that_reopen_discards() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("pending.log");

        let kept = {
            let backend = FaultyBackend::new(Box::new(FileBackend::open(&log_path).unwrap()));
            let faults = backend.handle();
            let store =
                PendingStore::open_with_backend(Box::new(backend), StoreConfig::default()).unwrap();
            let kept = store.append(b"survives").unwrap();

            faults.crash_after(10);
            assert!(store.append(&[0xEE; 64]).is_err());
            assert!(faults.has_crashed());
            kept
        };

        let torn_len = std::fs::metadata(&log_path).unwrap().len();
        let store = PendingStore::open_with_backend(
            Box::new(FileBackend::open(&log_path).unwrap()),
            StoreConfig::default(),
        )
        .unwrap();
        assert_eq!(store.list_ids(), vec![kept]);
        assert_eq!(store.log_size(), torn_len - 10);
    }
}
