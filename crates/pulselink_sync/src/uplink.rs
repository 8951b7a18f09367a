//! Live capture path: encode, send, fall back to the store.

use crate::config::UplinkConfig;
use crate::error::{SyncError, SyncResult};
use crate::inbox::CONTROL_PREFIX;
use crate::retry::RetryingSender;
use pulselink_codec::{pack_envelopes, WireEnvelope};
use pulselink_core::{PendingStore, RecordId};
use pulselink_protocol::{Sensor, SensorKind, Value};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

/// What happened to a unit handed to the uplink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The peer accepted it.
    Sent,
    /// Retries ran out; it waits in the store under this id.
    Queued(RecordId),
}

/// Turns captured batches into transfer units and delivers them.
///
/// A unit is written to the store only after the sender has given up on
/// it, and then exactly once.
pub struct Uplink {
    sender: Arc<RetryingSender>,
    store: Arc<PendingStore>,
    config: UplinkConfig,
}

impl Uplink {
    /// Creates an uplink.
    pub fn new(sender: Arc<RetryingSender>, store: Arc<PendingStore>, config: UplinkConfig) -> Self {
        Self {
            sender,
            store,
            config,
        }
    }

    /// Capture callback: a batch of samples for one sensor.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Model`] for an unknown sensor name or values that do
    ///   not fit the sensor
    /// - [`SyncError::Store`] if the fallback write fails
    pub async fn on_batch(
        &self,
        sensor_name: &str,
        recording_start: SystemTime,
        values: Vec<Value>,
    ) -> SyncResult<Delivery> {
        let kind = SensorKind::from_name(sensor_name)?;
        let sensor = Sensor::from_values(kind, recording_start, values)?;
        self.send_sensor(&sensor).await
    }

    /// Encodes and delivers an already-built sensor.
    ///
    /// # Errors
    ///
    /// See [`Uplink::on_batch`].
    pub async fn send_sensor(&self, sensor: &Sensor) -> SyncResult<Delivery> {
        let unit = self.encode(sensor)?;
        debug!(
            sensor = sensor.name(),
            values = sensor.len(),
            unit_len = unit.len(),
            "encoded sensor batch"
        );
        self.deliver(unit).await
    }

    /// Sends a control message under `control/<topic>`.
    ///
    /// # Errors
    ///
    /// See [`Uplink::on_batch`].
    pub async fn send_control(&self, topic: &str, payload: Vec<u8>) -> SyncResult<Delivery> {
        let envelope = WireEnvelope::new(format!("{CONTROL_PREFIX}{topic}"), payload);
        let unit = pack_envelopes(&[envelope])?;
        self.deliver(unit).await
    }

    /// Builds the transfer unit for `sensor`: one envelope per chunk,
    /// packed and compressed.
    ///
    /// # Errors
    ///
    /// Returns a model or codec error if a chunk cannot be encoded.
    pub fn encode(&self, sensor: &Sensor) -> SyncResult<Vec<u8>> {
        let envelopes = sensor
            .chunked(self.config.chunk_size)
            .map(|chunk| -> SyncResult<WireEnvelope> {
                Ok(WireEnvelope::new(sensor.name(), chunk.to_payload()?))
            })
            .collect::<SyncResult<Vec<_>>>()?;
        Ok(pack_envelopes(&envelopes)?)
    }

    async fn deliver(&self, unit: Vec<u8>) -> SyncResult<Delivery> {
        match self.sender.send(&unit, self.config.max_retries).await {
            Ok(()) => Ok(Delivery::Sent),
            Err(SyncError::SendFailed {
                attempts,
                last_error,
            }) => {
                let id = self.store.append(&unit)?;
                warn!(
                    attempts,
                    error = %last_error,
                    record = %id,
                    "unit not delivered, queued for resync"
                );
                Ok(Delivery::Queued(id))
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for Uplink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uplink")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MockChannel;
    use crate::config::RetryConfig;
    use pulselink_codec::unpack_envelopes;
    use pulselink_protocol::{DistanceKind, DistanceValue, MotionValue};
    use std::time::{Duration, UNIX_EPOCH};

    fn start() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn motion(count: u64) -> Vec<Value> {
        (0..count)
            .map(|i| MotionValue::new(start() + Duration::from_millis(i * 10), 0.0, 0.0, 1.0).into())
            .collect()
    }

    fn uplink_over(channel: &Arc<MockChannel>) -> (Uplink, Arc<PendingStore>) {
        let store = Arc::new(PendingStore::open_in_memory().unwrap());
        let sender = Arc::new(RetryingSender::new(channel.clone(), RetryConfig::default()));
        (
            Uplink::new(sender, store.clone(), UplinkConfig::default()),
            store,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn chunks_motion_batch_into_envelopes() {
        let channel = Arc::new(MockChannel::new());
        let (uplink, store) = uplink_over(&channel);

        let delivery = uplink
            .on_batch("accelerometer", start(), motion(250))
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Sent);
        assert!(store.is_empty());

        let delivered = channel.delivered();
        assert_eq!(delivered.len(), 1);
        let envelopes = unpack_envelopes(&delivered[0]).unwrap();
        assert_eq!(envelopes.len(), 3);
        let sizes: Vec<usize> = envelopes
            .iter()
            .map(|e| {
                assert_eq!(e.key, "accelerometer");
                Sensor::from_payload(&e.payload).unwrap().len()
            })
            .collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[tokio::test(start_paused = true)]
    async fn non_motion_batch_is_one_envelope() {
        let channel = Arc::new(MockChannel::new());
        let (uplink, _store) = uplink_over(&channel);
        let values: Vec<Value> = (0..150u64)
            .map(|i| {
                DistanceValue {
                    timestamp: start() + Duration::from_secs(i),
                    meters: i as f64,
                }
                .into()
            })
            .collect();

        uplink
            .on_batch(
                SensorKind::from(DistanceKind::Cycling).name(),
                start(),
                values,
            )
            .await
            .unwrap();
        let envelopes = unpack_envelopes(&channel.delivered()[0]).unwrap();
        assert_eq!(envelopes.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_queue_unit_once() {
        let channel = Arc::new(MockChannel::offline());
        let (uplink, store) = uplink_over(&channel);

        let delivery = uplink.on_batch("gyroscope", start(), motion(10)).await.unwrap();
        let Delivery::Queued(id) = delivery else {
            panic!("expected queued, got {delivery:?}");
        };
        assert_eq!(channel.calls(), 4);
        assert_eq!(store.list_ids(), vec![id]);

        let sensor = Sensor::from_values(
            SensorKind::from_name("gyroscope").unwrap(),
            start(),
            motion(10),
        )
        .unwrap();
        assert_eq!(store.get_one(id).unwrap(), uplink.encode(&sensor).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_sensor_name_is_rejected_before_sending() {
        let channel = Arc::new(MockChannel::new());
        let (uplink, store) = uplink_over(&channel);
        let err = uplink.on_batch("barometer", start(), Vec::new()).await.unwrap_err();
        assert!(matches!(err, SyncError::Model(_)));
        assert_eq!(channel.calls(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn control_messages_use_prefixed_key() {
        let channel = Arc::new(MockChannel::new());
        let (uplink, _store) = uplink_over(&channel);
        uplink.send_control("session-end", b"bye".to_vec()).await.unwrap();

        let envelopes = unpack_envelopes(&channel.delivered()[0]).unwrap();
        assert_eq!(envelopes[0].key, "control/session-end");
        assert_eq!(envelopes[0].payload.as_ref(), b"bye");
    }
}
