//! # PulseLink Storage
//!
//! Append-only byte stores used by the pending queue in `pulselink_core`.
//!
//! Backends never interpret what they hold. The queue log owns the entry
//! format; a backend only reads ranges, appends, syncs, truncates a torn
//! tail and swaps in a compacted image.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - tests and throwaway queues
//! - [`FileBackend`] - a single file that survives process restarts
//!
//! ## Example
//!
//! ```rust
//! use pulselink_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"accel batch").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"accel");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
