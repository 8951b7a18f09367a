//! # PulseLink Sync
//!
//! At-least-once delivery of sensor batches from the wearable to the phone.
//!
//! - [`Channel`]: the unreliable link, with [`MockChannel`] and
//!   [`LoopbackChannel`] for tests
//! - [`RetryingSender`]: bounded retries with a fixed (or growing) delay
//! - [`Uplink`]: capture callback; falls back to the pending store once
//!   retries are exhausted
//! - [`ResyncEngine`]: drains the store in groups, removing a group only
//!   when all of it was delivered
//! - [`Inbox`]: the receiving side, merging sensors by name
//! - [`SyncNode`]: all of the above wired around one store
//!
//! ## Flow
//!
//! ```text
//! samples -> Sensor -> chunks -> envelopes -> packed unit -> RetryingSender
//!                                                     |- sent: done
//!                                                     '- failed: PendingStore
//! PendingStore -> ResyncEngine -> RetryingSender -> remove on success
//! ```
//!
//! ```rust
//! use pulselink_sync::{Inbox, LoopbackChannel, SyncConfig, SyncNode, Delivery};
//! use pulselink_protocol::{MotionValue, Value};
//! use std::sync::Arc;
//! use std::time::{Duration, UNIX_EPOCH};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let start = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
//! let inbox = Arc::new(Inbox::new(start));
//! let node = SyncNode::in_memory(
//!     Arc::new(LoopbackChannel::new(inbox.clone())),
//!     SyncConfig::default(),
//! )
//! .unwrap();
//!
//! let values: Vec<Value> = (0..5)
//!     .map(|i| Value::from(MotionValue::new(start + Duration::from_millis(i * 10), 0.0, 0.0, 1.0)))
//!     .collect();
//! let delivery = node.on_batch("accelerometer", start, values).await.unwrap();
//! assert_eq!(delivery, Delivery::Sent);
//! assert_eq!(inbox.sensor("accelerometer").unwrap().len(), 5);
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod config;
mod error;
mod inbox;
mod node;
mod resync;
mod retry;
mod uplink;

pub use channel::{Channel, ChannelError, LoopbackChannel, MockChannel};
pub use config::{Backoff, ResyncConfig, RetryConfig, SyncConfig, UplinkConfig};
pub use error::{SyncError, SyncResult};
pub use inbox::{Inbox, CONTROL_PREFIX};
pub use node::SyncNode;
pub use resync::{ResyncEngine, ResyncReport, ResyncState};
pub use retry::{RetryingSender, SendState, SendStats};
pub use uplink::{Delivery, Uplink};
