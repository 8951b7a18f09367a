//! # PulseLink Core
//!
//! The durable pending queue that holds transfer units the channel could not
//! deliver, until a resync pass gets them through.
//!
//! - [`PendingStore`]: append, read, remove and compact opaque blobs
//! - [`RecordId`]: random ids assigned on append
//! - [`StoreConfig`]: durability and compaction settings
//!
//! ## Layout
//!
//! A file-backed store is a directory holding a `LOCK` file and an
//! append-only `pending.log` (see [`log`]). The log is replayed on open;
//! a torn final entry is cut, damage anywhere else fails the open.
//!
//! ```rust
//! use pulselink_core::{PendingStore, StoreConfig};
//!
//! let dir = tempfile::tempdir()?;
//! let id = {
//!     let store = PendingStore::open(dir.path(), StoreConfig::default())?;
//!     store.append(b"queued unit")?
//! };
//! let store = PendingStore::open(dir.path(), StoreConfig::default())?;
//! assert_eq!(store.get_one(id)?, b"queued unit");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
pub mod log;
mod store;
mod types;

pub use config::StoreConfig;
pub use dir::StoreDir;
pub use error::{CoreError, CoreResult};
pub use store::PendingStore;
pub use types::RecordId;
