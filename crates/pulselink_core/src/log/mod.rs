//! The append-only entry log behind the pending store.

mod entry;
mod reader;

pub use entry::{compute_crc32, EntryType, LogEntry, LOG_MAGIC, LOG_VERSION};
pub(crate) use entry::{CRC_SIZE, HEADER_SIZE};
pub(crate) use reader::{LogReader, Scanned};
