//! The durable pending-queue store.

use crate::config::StoreConfig;
use crate::dir::StoreDir;
use crate::error::{CoreError, CoreResult};
use crate::log::{LogEntry, LogReader, Scanned, CRC_SIZE, HEADER_SIZE};
use crate::types::RecordId;
use parking_lot::{Mutex, RwLock};
use pulselink_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bytes a record adds to an append entry besides its blob: id + length.
const RECORD_OVERHEAD: u64 = (RecordId::LEN + 4) as u64;

/// Size of a framed header entry.
const HEADER_FRAME_LEN: u64 = (HEADER_SIZE + RecordId::LEN + CRC_SIZE) as u64;

/// Where a live blob sits in the log.
#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: u64,
    len: usize,
}

/// In-memory view of the live records, rebuilt from the log on open.
#[derive(Debug, Default)]
struct Index {
    slots: HashMap<RecordId, Slot>,
    /// Blob offset to id; offsets grow with insertion order.
    order: BTreeMap<u64, RecordId>,
    /// Sum of blob lengths plus per-record overhead.
    live_bytes: u64,
    /// Ids removed or cleared since the log was last rewritten.
    retired: HashSet<RecordId>,
}

impl Index {
    fn contains(&self, id: &RecordId) -> bool {
        self.slots.contains_key(id)
    }

    /// Live or retired; either way the id must not be handed out again.
    fn is_taken(&self, id: &RecordId) -> bool {
        self.slots.contains_key(id) || self.retired.contains(id)
    }

    fn insert(&mut self, id: RecordId, slot: Slot) -> CoreResult<()> {
        if self.slots.contains_key(&id) {
            return Err(CoreError::consistency(format!(
                "append reuses live record id {id}"
            )));
        }
        if self.retired.contains(&id) {
            return Err(CoreError::consistency(format!(
                "append reuses deleted record id {id}"
            )));
        }
        self.slots.insert(id, slot);
        self.order.insert(slot.offset, id);
        self.live_bytes += RECORD_OVERHEAD + slot.len as u64;
        Ok(())
    }

    fn remove(&mut self, id: &RecordId) -> CoreResult<()> {
        let slot = self.slots.remove(id).ok_or_else(|| {
            CoreError::consistency(format!("remove of unknown record id {id}"))
        })?;
        self.order.remove(&slot.offset);
        self.live_bytes -= RECORD_OVERHEAD + slot.len as u64;
        self.retired.insert(*id);
        Ok(())
    }

    fn clear(&mut self) {
        self.retired.extend(self.slots.keys().copied());
        self.slots.clear();
        self.order.clear();
        self.live_bytes = 0;
    }

    /// Applies an entry that starts at `offset` in the log.
    fn apply(&mut self, offset: u64, entry: &LogEntry) -> CoreResult<()> {
        match entry {
            LogEntry::Header { .. } => {}
            LogEntry::Append { .. } => {
                for (id, rel, len) in entry.record_layout() {
                    self.insert(
                        id,
                        Slot {
                            offset: offset + rel,
                            len,
                        },
                    )?;
                }
            }
            LogEntry::Remove { ids } => {
                for id in ids {
                    self.remove(id)?;
                }
            }
            LogEntry::Clear => self.clear(),
        }
        Ok(())
    }

    /// Size of the log after compaction.
    fn compacted_size(&self) -> u64 {
        if self.slots.is_empty() {
            HEADER_FRAME_LEN
        } else {
            HEADER_FRAME_LEN + (HEADER_SIZE + 4 + CRC_SIZE) as u64 + self.live_bytes
        }
    }
}

/// State owned by the single writer.
#[derive(Debug)]
struct WriterState {
    log_size: u64,
}

/// A durable queue of opaque blobs awaiting redelivery.
///
/// Every mutation is one framed entry appended to a log (see
/// [`crate::log`]); the set of live records is rebuilt by replaying it on
/// open. Mutations are serialized through an internal writer lock, while
/// reads share the index and backend and may run alongside appends.
///
/// # Example
///
/// ```rust
/// use pulselink_core::PendingStore;
///
/// let store = PendingStore::open_in_memory()?;
/// let id = store.append(b"unit")?;
/// assert_eq!(store.get(&[id])?, vec![b"unit".to_vec()]);
/// store.remove(&[id])?;
/// assert!(store.is_empty());
/// # Ok::<(), pulselink_core::CoreError>(())
/// ```
pub struct PendingStore {
    store_id: [u8; 16],
    config: StoreConfig,
    backend: RwLock<Box<dyn StorageBackend>>,
    index: RwLock<Index>,
    writer: Mutex<WriterState>,
    /// Held for the directory lock; `None` for memory and custom backends.
    dir: Option<StoreDir>,
}

impl PendingStore {
    /// Opens the store in directory `path`, creating it if configured to.
    ///
    /// The directory is locked for the lifetime of the store.
    ///
    /// # Errors
    ///
    /// - [`CoreError::StoreLocked`] if another process has the store open
    /// - [`CoreError::LogCorruption`] if the log is damaged before its tail
    /// - [`CoreError::Consistency`] if the replayed entries contradict each other
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> CoreResult<Self> {
        let dir = StoreDir::open(path.as_ref(), config.create_if_missing)?;
        let backend = FileBackend::open(&dir.log_path())?;
        Self::open_inner(Box::new(backend), config, Some(dir))
    }

    /// Opens a fresh store kept entirely in memory.
    ///
    /// # Errors
    ///
    /// Only fails if the initial header cannot be written.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_backend(Box::new(InMemoryBackend::new()), StoreConfig::default())
    }

    /// Opens a store over an arbitrary backend.
    ///
    /// # Errors
    ///
    /// Same as [`PendingStore::open`], minus locking.
    pub fn open_with_backend(
        backend: Box<dyn StorageBackend>,
        config: StoreConfig,
    ) -> CoreResult<Self> {
        Self::open_inner(backend, config, None)
    }

    fn open_inner(
        mut backend: Box<dyn StorageBackend>,
        config: StoreConfig,
        dir: Option<StoreDir>,
    ) -> CoreResult<Self> {
        let (store_id, index) = replay(backend.as_mut())?;
        let store_id = match store_id {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().into_bytes();
                backend.append(&LogEntry::Header { store_id: id }.encode()?)?;
                backend.sync()?;
                id
            }
        };
        let log_size = backend.size()?;

        info!(
            store_id = %Uuid::from_bytes(store_id),
            records = index.slots.len(),
            log_size,
            "pending store opened"
        );

        Ok(Self {
            store_id,
            config,
            backend: RwLock::new(backend),
            index: RwLock::new(index),
            writer: Mutex::new(WriterState { log_size }),
            dir,
        })
    }

    /// Returns the random id written in the log header.
    #[must_use]
    pub fn store_id(&self) -> Uuid {
        Uuid::from_bytes(self.store_id)
    }

    /// Returns the store directory, if the store is file-backed.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.path().to_path_buf())
    }

    /// Returns the configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Appends one blob and returns its new id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the entry cannot be written; nothing is
    /// stored in that case.
    pub fn append(&self, blob: &[u8]) -> CoreResult<RecordId> {
        let ids = self.append_many(&[blob])?;
        ids.first()
            .copied()
            .ok_or_else(|| CoreError::consistency("append produced no id"))
    }

    /// Appends blobs as one entry. Either all of them are stored or none.
    ///
    /// Returned ids are in input order. An empty input writes nothing.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the entry cannot be written.
    pub fn append_many<B: AsRef<[u8]>>(&self, blobs: &[B]) -> CoreResult<Vec<RecordId>> {
        if blobs.is_empty() {
            return Ok(Vec::new());
        }

        let mut writer = self.writer.lock();
        let ids = {
            let index = self.index.read();
            let mut fresh = HashSet::with_capacity(blobs.len());
            let mut ids = Vec::with_capacity(blobs.len());
            while ids.len() < blobs.len() {
                let id = RecordId::new();
                if !index.is_taken(&id) && fresh.insert(id) {
                    ids.push(id);
                }
            }
            ids
        };

        let entry = LogEntry::Append {
            records: ids
                .iter()
                .zip(blobs)
                .map(|(id, blob)| (*id, blob.as_ref().to_vec()))
                .collect(),
        };
        let offset = self.write_entry(&mut writer, &entry)?;
        self.index.write().apply(offset, &entry)?;

        debug!(count = ids.len(), offset, "appended records");
        Ok(ids)
    }

    /// Returns every outstanding id, oldest first.
    #[must_use]
    pub fn list_ids(&self) -> Vec<RecordId> {
        self.index.read().order.values().copied().collect()
    }

    /// Returns the blobs for `ids`, in the same order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecordNotFound`] for the first id that is not
    /// in the store.
    pub fn get(&self, ids: &[RecordId]) -> CoreResult<Vec<Vec<u8>>> {
        let index = self.index.read();
        let backend = self.backend.read();
        ids.iter()
            .map(|id| {
                let slot = index
                    .slots
                    .get(id)
                    .ok_or(CoreError::RecordNotFound { id: *id })?;
                Ok(backend.read_at(slot.offset, slot.len)?)
            })
            .collect()
    }

    /// Returns the blob for a single id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecordNotFound`] if the id is not in the store.
    pub fn get_one(&self, id: RecordId) -> CoreResult<Vec<u8>> {
        let mut blobs = self.get(&[id])?;
        blobs.pop().ok_or(CoreError::RecordNotFound { id })
    }

    /// Returns true if `id` is outstanding.
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.index.read().contains(&id)
    }

    /// Returns the number of outstanding records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.read().slots.len()
    }

    /// Returns true if nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes `ids` as one entry. If any id is missing nothing is removed.
    ///
    /// Repeated ids are removed once. May compact the log afterwards when
    /// enough dead bytes have piled up.
    ///
    /// # Errors
    ///
    /// - [`CoreError::RecordNotFound`] for the first missing id
    /// - a storage error if the entry cannot be written
    pub fn remove(&self, ids: &[RecordId]) -> CoreResult<()> {
        let mut seen = HashSet::with_capacity(ids.len());
        let unique: Vec<RecordId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if unique.is_empty() {
            return Ok(());
        }

        let mut writer = self.writer.lock();
        {
            let index = self.index.read();
            if let Some(missing) = unique.iter().find(|id| !index.contains(id)) {
                return Err(CoreError::RecordNotFound { id: *missing });
            }
        }

        let count = unique.len();
        let entry = LogEntry::Remove { ids: unique };
        let offset = self.write_entry(&mut writer, &entry)?;
        self.index.write().apply(offset, &entry)?;
        debug!(count, offset, "removed records");

        self.maybe_compact(&mut writer);
        Ok(())
    }

    /// Deletes every record.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the entry cannot be written.
    pub fn clear(&self) -> CoreResult<()> {
        let mut writer = self.writer.lock();
        let entry = LogEntry::Clear;
        let offset = self.write_entry(&mut writer, &entry)?;
        self.index.write().apply(offset, &entry)?;
        debug!(offset, "cleared store");

        self.maybe_compact(&mut writer);
        Ok(())
    }

    /// Rewrites the log with only the live records and swaps it in
    /// atomically. Ids and their order are kept.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the new log cannot be written; the old
    /// one stays in place.
    pub fn compact(&self) -> CoreResult<()> {
        let mut writer = self.writer.lock();
        self.compact_locked(&mut writer)
    }

    /// Bytes in the log that compaction would reclaim.
    #[must_use]
    pub fn dead_bytes(&self) -> u64 {
        let writer = self.writer.lock();
        let index = self.index.read();
        writer.log_size.saturating_sub(index.compacted_size())
    }

    /// Current log size in bytes.
    #[must_use]
    pub fn log_size(&self) -> u64 {
        self.writer.lock().log_size
    }

    /// Appends and syncs one framed entry. A failed write is cut off again
    /// so later entries never land after a partial one.
    fn write_entry(&self, writer: &mut WriterState, entry: &LogEntry) -> CoreResult<u64> {
        let frame = entry.encode()?;
        let mut backend = self.backend.write();

        let written = backend.append(&frame).and_then(|offset| {
            if self.config.sync_on_write {
                backend.sync()?;
            }
            Ok(offset)
        });

        match written {
            Ok(offset) => {
                writer.log_size = offset + frame.len() as u64;
                Ok(offset)
            }
            Err(e) => {
                if let Err(cleanup) = backend.truncate(writer.log_size) {
                    warn!(error = %cleanup, "could not cut failed log write");
                }
                Err(e.into())
            }
        }
    }

    fn maybe_compact(&self, writer: &mut WriterState) {
        let threshold = self.config.compact_threshold_bytes;
        if threshold == 0 {
            return;
        }
        let dead = writer
            .log_size
            .saturating_sub(self.index.read().compacted_size());
        if dead < threshold {
            return;
        }
        // The triggering mutation is already durable; a failed compaction
        // only leaves the log larger than necessary.
        if let Err(e) = self.compact_locked(writer) {
            warn!(error = %e, dead_bytes = dead, "automatic compaction failed");
        }
    }

    fn compact_locked(&self, writer: &mut WriterState) -> CoreResult<()> {
        let mut index = self.index.write();
        let mut backend = self.backend.write();

        let records = index
            .order
            .values()
            .map(|id| {
                let slot = index.slots.get(id).ok_or_else(|| {
                    CoreError::consistency(format!("index order lists unknown id {id}"))
                })?;
                Ok((*id, backend.read_at(slot.offset, slot.len)?))
            })
            .collect::<CoreResult<Vec<_>>>()?;
        let count = records.len();

        let mut image = LogEntry::Header {
            store_id: self.store_id,
        }
        .encode()?;
        let mut rebuilt = Index::default();
        if !records.is_empty() {
            let append = LogEntry::Append { records };
            rebuilt.apply(image.len() as u64, &append)?;
            image.extend_from_slice(&append.encode()?);
        }

        backend.replace(&image)?;
        let before = writer.log_size;
        writer.log_size = image.len() as u64;
        rebuilt.retired = std::mem::take(&mut index.retired);
        *index = rebuilt;

        info!(
            records = count,
            before,
            after = writer.log_size,
            "compacted pending log"
        );
        Ok(())
    }
}

impl std::fmt::Debug for PendingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingStore")
            .field("store_id", &self.store_id())
            .field("records", &self.len())
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

/// Rebuilds the index from the log, cutting a torn tail if there is one.
fn replay(backend: &mut dyn StorageBackend) -> CoreResult<(Option<[u8; 16]>, Index)> {
    let mut store_id = None;
    let mut index = Index::default();
    let mut torn_at = None;

    for item in LogReader::new(&*backend)? {
        match item? {
            Scanned::Entry { offset, entry, .. } => match (&entry, store_id) {
                (LogEntry::Header { store_id: found }, None) => store_id = Some(*found),
                (LogEntry::Header { store_id: found }, Some(existing)) => {
                    if *found != existing {
                        return Err(CoreError::consistency(format!(
                            "second header at offset {offset} names a different store"
                        )));
                    }
                }
                (_, None) => {
                    return Err(CoreError::consistency(
                        "log does not start with a header entry",
                    ));
                }
                (_, Some(_)) => index.apply(offset, &entry)?,
            },
            Scanned::TornTail { valid_len } => torn_at = Some(valid_len),
        }
    }

    if let Some(valid_len) = torn_at {
        let size = backend.size()?;
        warn!(
            valid_len,
            discarded = size - valid_len,
            "discarding torn entry at end of pending log"
        );
        backend.truncate(valid_len)?;
        backend.sync()?;
    }

    Ok((store_id, index))
}
