//! Bounded retry around a single channel send.

use crate::channel::Channel;
use crate::config::RetryConfig;
use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where one send is in its lifecycle.
///
/// `Pending -> Sent`, `Pending -> Retrying -> Pending`, or
/// `Pending -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// About to call the channel.
    Pending,
    /// Waiting before the next attempt.
    Retrying,
    /// The channel accepted the unit.
    Sent,
    /// Attempts are exhausted or the error cannot be retried.
    Failed,
}

impl SendState {
    /// Returns true for `Sent` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SendState::Sent | SendState::Failed)
    }
}

/// Counters across every send made by one sender.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendStats {
    /// Channel calls made.
    pub attempts: u64,
    /// Waits taken before a repeated call.
    pub retries: u64,
    /// Units the channel accepted.
    pub sent: u64,
    /// Units given up on.
    pub failed: u64,
}

/// Sends units over a [`Channel`], retrying transient failures.
///
/// The sender never queues: a unit that cannot be delivered is reported
/// back to the caller, who decides where it goes.
pub struct RetryingSender {
    channel: Arc<dyn Channel>,
    config: RetryConfig,
    stats: Mutex<SendStats>,
}

impl RetryingSender {
    /// Creates a sender over `channel`.
    pub fn new(channel: Arc<dyn Channel>, config: RetryConfig) -> Self {
        Self {
            channel,
            config,
            stats: Mutex::new(SendStats::default()),
        }
    }

    /// Returns the retry configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> SendStats {
        self.stats.lock().clone()
    }

    /// Sends `payload` with the configured number of retries.
    ///
    /// # Errors
    ///
    /// See [`RetryingSender::send`].
    pub async fn send_default(&self, payload: &[u8]) -> SyncResult<()> {
        self.send(payload, self.config.max_retries).await
    }

    /// Sends `payload`, making at most `max_retries + 1` channel calls.
    ///
    /// Retryable failures wait [`RetryConfig::delay_for_retry`] before the
    /// next call; a non-retryable failure ends the send at once.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SendFailed`] with the attempt count and the
    /// last channel error.
    pub async fn send(&self, payload: &[u8], max_retries: u32) -> SyncResult<()> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.stats.lock().attempts += 1;
            debug!(
                state = ?SendState::Pending,
                attempt,
                len = payload.len(),
                "sending unit"
            );

            let error = match self.channel.try_send(payload).await {
                Ok(_reply) => {
                    self.stats.lock().sent += 1;
                    debug!(state = ?SendState::Sent, attempt, "unit delivered");
                    return Ok(());
                }
                Err(e) => e,
            };

            let retries_used = attempt - 1;
            if !error.is_retryable() || retries_used >= max_retries {
                self.stats.lock().failed += 1;
                warn!(
                    state = ?SendState::Failed,
                    attempts = attempt,
                    retryable = error.is_retryable(),
                    error = %error,
                    "giving up on unit"
                );
                return Err(SyncError::SendFailed {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.config.delay_for_retry(attempt);
            self.stats.lock().retries += 1;
            warn!(
                state = ?SendState::Retrying,
                attempt,
                max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "send failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl std::fmt::Debug for RetryingSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingSender")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
