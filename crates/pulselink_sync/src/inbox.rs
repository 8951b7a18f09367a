//! Receiving side: unpacks transfer units and accumulates sensors by name.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use pulselink_codec::{unpack_envelopes, WireEnvelope};
use pulselink_protocol::{empty_sensor_of_each, ModelError, Sensor};
use std::collections::BTreeMap;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Envelope keys with this prefix carry control messages, not sensors.
pub const CONTROL_PREFIX: &str = "control/";

#[derive(Debug, Default)]
struct InboxState {
    sensors: BTreeMap<String, Sensor>,
    control: Vec<WireEnvelope>,
    units: u64,
}

/// Accumulates received sensors, one merged [`Sensor`] per name.
///
/// A unit is applied as a whole: if any envelope or payload in it fails
/// to decode, nothing from that unit is merged.
#[derive(Debug)]
pub struct Inbox {
    state: Mutex<InboxState>,
}

impl Inbox {
    /// Creates an inbox seeded with one empty sensor per known kind.
    pub fn new(recording_start: SystemTime) -> Self {
        Self {
            state: Mutex::new(InboxState {
                sensors: empty_sensor_of_each(recording_start),
                ..InboxState::default()
            }),
        }
    }

    /// Decodes `unit` and merges its sensors. Returns how many sensors
    /// were merged.
    ///
    /// # Errors
    ///
    /// Returns a codec or model error for a malformed unit, in which case
    /// the inbox is unchanged.
    pub fn on_receive(&self, unit: &[u8]) -> SyncResult<usize> {
        let decoded = decode_unit(unit).inspect_err(|e| {
            warn!(len = unit.len(), error = %e, "rejecting malformed unit");
        })?;
        let count = decoded.sensors.len();

        let mut state = self.state.lock();
        let mut staged: BTreeMap<String, Sensor> = BTreeMap::new();
        for sensor in decoded.sensors {
            let name = sensor.name().to_string();
            let current = match staged.remove(&name) {
                Some(current) => current,
                None => state
                    .sensors
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| Sensor::empty(sensor.kind(), sensor.recording_start())),
            };
            staged.insert(name, current.merge(sensor)?);
        }
        state.sensors.extend(staged);
        state.control.extend(decoded.control);
        state.units += 1;
        drop(state);

        debug!(sensors = count, "merged received unit");
        Ok(count)
    }

    /// Returns the accumulated sensor with `name`.
    pub fn sensor(&self, name: &str) -> Option<Sensor> {
        self.state.lock().sensors.get(name).cloned()
    }

    /// Returns every accumulated sensor, keyed by name.
    pub fn sensors(&self) -> BTreeMap<String, Sensor> {
        self.state.lock().sensors.clone()
    }

    /// Returns and forgets the control messages received so far.
    pub fn take_control(&self) -> Vec<WireEnvelope> {
        std::mem::take(&mut self.state.lock().control)
    }

    /// Number of units accepted.
    pub fn units_received(&self) -> u64 {
        self.state.lock().units
    }
}

struct DecodedUnit {
    sensors: Vec<Sensor>,
    control: Vec<WireEnvelope>,
}

fn decode_unit(unit: &[u8]) -> SyncResult<DecodedUnit> {
    let mut decoded = DecodedUnit {
        sensors: Vec::new(),
        control: Vec::new(),
    };
    for envelope in unpack_envelopes(unit)? {
        if envelope.key.starts_with(CONTROL_PREFIX) {
            decoded.control.push(envelope);
            continue;
        }
        let sensor = Sensor::from_payload(&envelope.payload)?;
        if sensor.name() != envelope.key {
            return Err(SyncError::Model(ModelError::payload(format!(
                "envelope {} carries sensor {}",
                envelope.key,
                sensor.name()
            ))));
        }
        decoded.sensors.push(sensor);
    }
    Ok(decoded)
}
