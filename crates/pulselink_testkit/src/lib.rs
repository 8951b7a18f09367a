//! # PulseLink Testkit
//!
//! Test utilities for PulseLink.
//!
//! This crate provides:
//! - Throwaway pending stores and sample sensor scenarios
//! - Property-based test generators using proptest
//! - A fault-injecting storage backend for failure and crash tests
//!
//! ## Usage
//!
//! ```
//! use pulselink_testkit::prelude::*;
//!
//! let (store, ids) = scenarios::populated_store(3);
//! assert_eq!(store.list_ids(), ids);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
