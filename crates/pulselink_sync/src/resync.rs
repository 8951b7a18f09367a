//! Drains the pending store back to the peer in groups.

use crate::config::ResyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::retry::RetryingSender;
use futures::future::join_all;
use parking_lot::RwLock;
use pulselink_core::PendingStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of the most recent resync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncState {
    /// No pass has run yet.
    Idle,
    /// A pass is in progress.
    Running,
    /// The last pass delivered every group it looked at.
    Complete,
    /// The last pass left records behind, stopped early, or failed.
    Incomplete,
}

impl ResyncState {
    /// Returns true while a pass is in progress.
    pub fn is_running(&self) -> bool {
        matches!(self, ResyncState::Running)
    }
}

/// Counts from one resync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResyncReport {
    /// Groups whose records were sent.
    pub groups_attempted: usize,
    /// Groups delivered in full and removed from the store.
    pub groups_synced: usize,
    /// Groups with at least one failed send; left in the store.
    pub groups_failed: usize,
    /// Records removed from the store.
    pub records_removed: usize,
    /// Records in the store when the pass ended.
    pub records_remaining: usize,
    /// True if the pass stopped with groups left unvisited.
    pub aborted: bool,
}

impl ResyncReport {
    /// Returns true if every visited group was delivered and none was skipped.
    pub fn is_complete(&self) -> bool {
        self.groups_failed == 0 && !self.aborted
    }
}

/// Re-sends stored units and removes them once acknowledged.
///
/// A pass takes a snapshot of the outstanding ids, splits it into groups
/// of [`ResyncConfig::group_size`], and sends each group's records
/// concurrently. A group is removed only if every send in it succeeded.
/// Once more than [`ResyncConfig::max_group_failures`] groups have failed,
/// the remaining groups are left for the next pass.
///
/// Interrupting a pass never removes part of a group, so a pass can
/// always be re-run from scratch. A group that was delivered but not yet
/// removed when the process died is sent again next time.
pub struct ResyncEngine {
    store: Arc<PendingStore>,
    sender: Arc<RetryingSender>,
    config: ResyncConfig,
    state: RwLock<ResyncState>,
    last_report: RwLock<Option<ResyncReport>>,
    running: AtomicBool,
    cancelled: AtomicBool,
}

/// Clears the running flag however the pass ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ResyncEngine {
    /// Creates an engine draining `store` through `sender`.
    pub fn new(store: Arc<PendingStore>, sender: Arc<RetryingSender>, config: ResyncConfig) -> Self {
        Self {
            store,
            sender,
            config,
            state: RwLock::new(ResyncState::Idle),
            last_report: RwLock::new(None),
            running: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> ResyncState {
        *self.state.read()
    }

    /// Returns the report of the last pass that ran to its end.
    pub fn last_report(&self) -> Option<ResyncReport> {
        self.last_report.read().clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ResyncConfig {
        &self.config
    }

    /// Asks a running pass to stop before its next group.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Runs one resync pass.
    ///
    /// # Errors
    ///
    /// - [`SyncError::ResyncInProgress`] if a pass is already running
    /// - [`SyncError::Cancelled`] if [`ResyncEngine::cancel`] was called
    /// - [`SyncError::Store`] if the store fails; the pass stops there
    ///
    /// Failed sends are not errors; they show up in the report.
    pub async fn run(&self) -> SyncResult<ResyncReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncError::ResyncInProgress);
        }
        let _running = RunningGuard(&self.running);
        self.cancelled.store(false, Ordering::SeqCst);
        *self.state.write() = ResyncState::Running;

        let result = self.run_pass().await;

        let state = match &result {
            Ok(report) if report.is_complete() => ResyncState::Complete,
            _ => ResyncState::Incomplete,
        };
        *self.state.write() = state;
        if let Ok(report) = &result {
            *self.last_report.write() = Some(report.clone());
        }
        result
    }

    async fn run_pass(&self) -> SyncResult<ResyncReport> {
        let ids = self.store.list_ids();
        let group_size = self.config.group_size.max(1);
        let mut report = ResyncReport::default();
        let mut failures: u32 = 0;

        for (index, group) in ids.chunks(group_size).enumerate() {
            if self.cancelled.load(Ordering::SeqCst) {
                warn!(group = index, "resync cancelled");
                return Err(SyncError::Cancelled);
            }
            if failures > self.config.max_group_failures {
                warn!(
                    failures,
                    skipped_groups = ids.len().div_ceil(group_size) - index,
                    "too many failed groups, stopping resync"
                );
                report.aborted = true;
                break;
            }

            report.groups_attempted += 1;
            let blobs = self.store.get(group).inspect_err(|e| {
                error!(group = index, error = %e, "could not read pending records");
            })?;

            let sends = blobs
                .iter()
                .map(|blob| self.sender.send(blob, self.config.max_retries));
            let failed = join_all(sends)
                .await
                .into_iter()
                .filter(Result::is_err)
                .count();

            if failed == 0 {
                self.store.remove(group).inspect_err(|e| {
                    error!(group = index, error = %e, "could not remove delivered records");
                })?;
                report.groups_synced += 1;
                report.records_removed += group.len();
            } else {
                failures += 1;
                report.groups_failed += 1;
                warn!(
                    group = index,
                    failed,
                    size = group.len(),
                    "group not fully delivered, keeping it"
                );
            }
        }

        report.records_remaining = self.store.len();
        info!(
            attempted = report.groups_attempted,
            synced = report.groups_synced,
            failed = report.groups_failed,
            removed = report.records_removed,
            remaining = report.records_remaining,
            aborted = report.aborted,
            "resync pass finished"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for ResyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResyncEngine")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
