//! The unreliable link to the peer device.

use crate::inbox::Inbox;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// A failed channel call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("channel error: {message}")]
pub struct ChannelError {
    /// Description of the failure.
    pub message: String,
    /// Whether the same payload may go through on a later attempt.
    pub retryable: bool,
}

impl ChannelError {
    /// Creates a transient error.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates an error that repeating the call will not fix.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

/// Sends one transfer unit to the peer.
///
/// Implementations carry their own timeouts; a hung peer must eventually
/// surface as an error.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Delivers `unit`. The peer may answer with a reply, which the write
    /// path ignores.
    async fn try_send(&self, unit: &[u8]) -> Result<Option<Vec<u8>>, ChannelError>;
}

#[async_trait]
impl<C: Channel + ?Sized> Channel for Arc<C> {
    async fn try_send(&self, unit: &[u8]) -> Result<Option<Vec<u8>>, ChannelError> {
        (**self).try_send(unit).await
    }
}

type Rejection = Box<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// A scripted channel for tests.
///
/// Outcomes are decided in this order: the offline switch, the count of
/// forced failures, then the rejection predicate. Every call is counted
/// and every accepted unit is recorded.
#[derive(Default)]
pub struct MockChannel {
    offline: AtomicBool,
    fatal: AtomicBool,
    fail_next: AtomicU32,
    reject: Mutex<Option<Rejection>>,
    calls: AtomicU32,
    delivered: Mutex<Vec<Vec<u8>>>,
    reply: Mutex<Option<Vec<u8>>>,
}

impl MockChannel {
    /// Creates a channel that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a channel that fails the next `n` calls, then accepts.
    pub fn failing_times(n: u32) -> Self {
        let channel = Self::new();
        channel.fail_next.store(n, Ordering::SeqCst);
        channel
    }

    /// Creates a channel that fails every call until brought back online.
    pub fn offline() -> Self {
        let channel = Self::new();
        channel.set_offline(true);
        channel
    }

    /// Makes every call fail (`true`) or go through (`false`).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes forced failures non-retryable.
    pub fn set_fatal(&self, fatal: bool) {
        self.fatal.store(fatal, Ordering::SeqCst);
    }

    /// Fails the next `n` calls.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Fails every call whose unit matches `predicate`.
    pub fn reject_when(&self, predicate: impl Fn(&[u8]) -> bool + Send + Sync + 'static) {
        *self.reject.lock() = Some(Box::new(predicate));
    }

    /// Stops rejecting units.
    pub fn clear_rejection(&self) {
        *self.reject.lock() = None;
    }

    /// Sets the reply returned for accepted units.
    pub fn set_reply(&self, reply: Option<Vec<u8>>) {
        *self.reply.lock() = reply;
    }

    /// Number of calls made, successful or not.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Units accepted so far, in arrival order.
    pub fn delivered(&self) -> Vec<Vec<u8>> {
        self.delivered.lock().clone()
    }

    fn failure(&self, message: &str) -> ChannelError {
        if self.fatal.load(Ordering::SeqCst) {
            ChannelError::fatal(message)
        } else {
            ChannelError::retryable(message)
        }
    }
}

impl std::fmt::Debug for MockChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChannel")
            .field("offline", &self.offline.load(Ordering::SeqCst))
            .field("fail_next", &self.fail_next.load(Ordering::SeqCst))
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn try_send(&self, unit: &[u8]) -> Result<Option<Vec<u8>>, ChannelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Err(self.failure("peer unreachable"));
        }
        let forced = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return Err(self.failure("scripted failure"));
        }
        if self.reject.lock().as_ref().is_some_and(|reject| reject(unit)) {
            return Err(self.failure("unit rejected"));
        }

        self.delivered.lock().push(unit.to_vec());
        Ok(self.reply.lock().clone())
    }
}

/// A channel that hands every unit straight to an [`Inbox`].
///
/// A unit the inbox cannot decode fails with a non-retryable error.
#[derive(Debug, Clone)]
pub struct LoopbackChannel {
    inbox: Arc<Inbox>,
}

impl LoopbackChannel {
    /// Creates a loopback into `inbox`.
    pub fn new(inbox: Arc<Inbox>) -> Self {
        Self { inbox }
    }

    /// Returns the receiving inbox.
    pub fn inbox(&self) -> &Arc<Inbox> {
        &self.inbox
    }
}

#[async_trait]
impl Channel for LoopbackChannel {
    async fn try_send(&self, unit: &[u8]) -> Result<Option<Vec<u8>>, ChannelError> {
        self.inbox
            .on_receive(unit)
            .map(|_| None)
            .map_err(|e| ChannelError::fatal(e.to_string()))
    }
}
