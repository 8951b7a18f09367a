//! Configuration for the sync layer.

use pulselink_core::StoreConfig;
use std::time::Duration;

/// How the wait between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Wait the same delay before every retry.
    Fixed,
    /// Multiply the delay after every retry, up to a cap.
    Exponential {
        /// Growth factor per retry.
        multiplier: f64,
        /// Upper bound on a single wait.
        max_delay: Duration,
    },
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub delay: Duration,
    /// How the wait grows.
    pub backoff: Backoff,
}

impl RetryConfig {
    /// Creates a fixed-delay configuration with `max_retries` retries.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            delay: Duration::from_secs(1),
            backoff: Backoff::Fixed,
        }
    }

    /// Creates a configuration that makes a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
            backoff: Backoff::Fixed,
        }
    }

    /// Sets the number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the backoff policy.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Wait before retry number `retry` (1-based).
    ///
    /// Exponential delays are capped at `max_delay` and never negative, even
    /// for a negative multiplier.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential {
                multiplier,
                max_delay,
            } => {
                let exp = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = self.delay.as_secs_f64() * multiplier.powi(exp);
                if secs.is_finite() {
                    Duration::from_secs_f64(secs.max(0.0).min(max_delay.as_secs_f64()))
                } else {
                    max_delay
                }
            }
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Configuration for resync passes.
#[derive(Debug, Clone)]
pub struct ResyncConfig {
    /// Records sent together and removed together.
    pub group_size: usize,
    /// Failed groups tolerated before a pass stops.
    pub max_group_failures: u32,
    /// Retries per record within a group.
    pub max_retries: u32,
}

impl ResyncConfig {
    /// Sets the group size.
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size;
        self
    }

    /// Sets the failed-group threshold.
    pub fn with_max_group_failures(mut self, failures: u32) -> Self {
        self.max_group_failures = failures;
        self
    }

    /// Sets the per-record retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            group_size: 10,
            max_group_failures: 5,
            max_retries: 3,
        }
    }
}

/// Configuration for the live uplink.
#[derive(Debug, Clone)]
pub struct UplinkConfig {
    /// Motion samples per envelope.
    pub chunk_size: usize,
    /// Retries before a unit falls back to the store.
    pub max_retries: u32,
}

impl UplinkConfig {
    /// Sets the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            max_retries: 3,
        }
    }
}

/// Everything needed to assemble a [`crate::SyncNode`].
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Pending store settings.
    pub store: StoreConfig,
    /// Delay policy of the retrying sender.
    pub retry: RetryConfig,
    /// Resync pass settings.
    pub resync: ResyncConfig,
    /// Live uplink settings.
    pub uplink: UplinkConfig,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the store configuration.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the resync configuration.
    pub fn with_resync(mut self, resync: ResyncConfig) -> Self {
        self.resync = resync;
        self
    }

    /// Sets the uplink configuration.
    pub fn with_uplink(mut self, uplink: UplinkConfig) -> Self {
        self.uplink = uplink;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.delay, Duration::from_secs(1));
        assert_eq!(config.retry.backoff, Backoff::Fixed);
        assert_eq!(config.resync.group_size, 10);
        assert_eq!(config.resync.max_group_failures, 5);
        assert_eq!(config.uplink.chunk_size, 100);
        assert!(config.store.sync_on_write);
    }

    #[test]
    fn fixed_delay_is_constant() {
        let config = RetryConfig::new(5).with_delay(Duration::from_millis(250));
        for retry in 1..=5 {
            assert_eq!(config.delay_for_retry(retry), Duration::from_millis(250));
        }
    }

    #[test]
    fn exponential_delay_grows_and_caps() {
        let config = RetryConfig::new(10)
            .with_delay(Duration::from_millis(100))
            .with_backoff(Backoff::Exponential {
                multiplier: 2.0,
                max_delay: Duration::from_secs(1),
            });
        assert_eq!(config.delay_for_retry(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_retry(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_retry(3), Duration::from_millis(400));
        assert_eq!(config.delay_for_retry(9), Duration::from_secs(1));
        assert_eq!(config.delay_for_retry(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn negative_multiplier_never_yields_negative_delay() {
        let config = RetryConfig::new(4)
            .with_delay(Duration::from_millis(100))
            .with_backoff(Backoff::Exponential {
                multiplier: -2.0,
                max_delay: Duration::from_secs(1),
            });
        assert_eq!(config.delay_for_retry(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_retry(2), Duration::ZERO);
        assert_eq!(config.delay_for_retry(3), Duration::from_millis(400));
    }

    #[test]
    fn no_retry_has_no_delay() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.delay_for_retry(1), Duration::ZERO);
    }

    #[test]
    fn builders_chain() {
        let config = SyncConfig::new()
            .with_resync(ResyncConfig::default().with_group_size(4).with_max_group_failures(1))
            .with_uplink(UplinkConfig::default().with_chunk_size(25).with_max_retries(0))
            .with_retry(RetryConfig::no_retry())
            .with_store(StoreConfig::default().sync_on_write(false));
        assert_eq!(config.resync.group_size, 4);
        assert_eq!(config.resync.max_group_failures, 1);
        assert_eq!(config.uplink.chunk_size, 25);
        assert_eq!(config.uplink.max_retries, 0);
        assert!(!config.store.sync_on_write);
    }
}
