//! One-stop assembly of the sync components around a shared store.

use crate::channel::Channel;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::resync::{ResyncEngine, ResyncReport};
use crate::retry::RetryingSender;
use crate::uplink::{Delivery, Uplink};
use pulselink_core::PendingStore;
use pulselink_protocol::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// The wearable-side sync stack: one store, one sender, the live uplink
/// and the resync engine, all sharing the same channel.
#[derive(Debug)]
pub struct SyncNode {
    store: Arc<PendingStore>,
    sender: Arc<RetryingSender>,
    uplink: Uplink,
    resync: ResyncEngine,
}

impl SyncNode {
    /// Opens the store in `path` and wires everything to `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Store`] if the store cannot be opened.
    pub fn open(
        path: impl AsRef<Path>,
        channel: Arc<dyn Channel>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        let store = PendingStore::open(path, config.store.clone())?;
        Ok(Self::with_store(Arc::new(store), channel, config))
    }

    /// Builds a node over a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Store`] if the store cannot be created.
    pub fn in_memory(channel: Arc<dyn Channel>, config: SyncConfig) -> SyncResult<Self> {
        let store = PendingStore::open_in_memory()?;
        Ok(Self::with_store(Arc::new(store), channel, config))
    }

    /// Builds a node over an existing store.
    pub fn with_store(store: Arc<PendingStore>, channel: Arc<dyn Channel>, config: SyncConfig) -> Self {
        let sender = Arc::new(RetryingSender::new(channel, config.retry));
        let uplink = Uplink::new(sender.clone(), store.clone(), config.uplink);
        let resync = ResyncEngine::new(store.clone(), sender.clone(), config.resync);
        Self {
            store,
            sender,
            uplink,
            resync,
        }
    }

    /// Returns the pending store.
    pub fn store(&self) -> &Arc<PendingStore> {
        &self.store
    }

    /// Returns the shared sender.
    pub fn sender(&self) -> &Arc<RetryingSender> {
        &self.sender
    }

    /// Returns the live uplink.
    pub fn uplink(&self) -> &Uplink {
        &self.uplink
    }

    /// Returns the resync engine.
    pub fn resync(&self) -> &ResyncEngine {
        &self.resync
    }

    /// Capture callback. See [`Uplink::on_batch`].
    ///
    /// # Errors
    ///
    /// See [`Uplink::on_batch`].
    pub async fn on_batch(
        &self,
        sensor_name: &str,
        recording_start: SystemTime,
        values: Vec<Value>,
    ) -> SyncResult<Delivery> {
        self.uplink
            .on_batch(sensor_name, recording_start, values)
            .await
    }

    /// Runs one resync pass. See [`ResyncEngine::run`].
    ///
    /// # Errors
    ///
    /// See [`ResyncEngine::run`].
    pub async fn resync_now(&self) -> SyncResult<ResyncReport> {
        self.resync.run().await
    }
}
