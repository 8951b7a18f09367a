//! Keyed wire envelope.
//!
//! An envelope is a CBOR map with three text keys, written in canonical
//! (length-first) order:
//!
//! | key       | type  | meaning                          |
//! |-----------|-------|----------------------------------|
//! | `v`       | uint  | envelope format version          |
//! | `key`     | text  | logical stream, e.g. sensor name |
//! | `payload` | bytes | opaque body                      |
//!
//! Unknown extra fields are ignored so later revisions can add them.

use crate::error::{CodecError, CodecResult};
use bytes::Bytes;
use ciborium::value::Value;

/// Envelope format version written by this build.
pub const ENVELOPE_VERSION: u8 = 1;

/// Largest payload accepted in an envelope.
pub const MAX_PAYLOAD_LEN: usize = 256 * 1024 * 1024;

const FIELD_VERSION: &str = "v";
const FIELD_KEY: &str = "key";
const FIELD_PAYLOAD: &str = "payload";

/// A keyed, opaque-payload wire unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WireEnvelope {
    /// Logical channel or stream the payload belongs to.
    pub key: String,
    /// Serialized sensor batch or control message.
    pub payload: Bytes,
}

impl WireEnvelope {
    /// Creates an envelope.
    pub fn new(key: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
        }
    }

    /// Creates an envelope from a raw key.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidUtf8`] if `key` is not UTF-8.
    pub fn from_raw_key(key: Vec<u8>, payload: impl Into<Bytes>) -> CodecResult<Self> {
        let key = String::from_utf8(key).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(Self::new(key, payload))
    }

    /// Encodes this envelope. See [`encode_envelope`].
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        encode_envelope(self)
    }

    /// Decodes an envelope. See [`decode_envelope`].
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        decode_envelope(bytes)
    }
}

/// Encodes an envelope to CBOR bytes.
///
/// # Errors
///
/// Returns [`CodecError::EncodingFailed`] for an empty key or a payload
/// larger than [`MAX_PAYLOAD_LEN`].
pub fn encode_envelope(envelope: &WireEnvelope) -> CodecResult<Vec<u8>> {
    if envelope.key.is_empty() {
        return Err(CodecError::encoding_failed("envelope key is empty"));
    }
    if envelope.payload.len() > MAX_PAYLOAD_LEN {
        return Err(CodecError::encoding_failed(format!(
            "payload of {} bytes exceeds maximum of {} bytes",
            envelope.payload.len(),
            MAX_PAYLOAD_LEN
        )));
    }

    let map = Value::Map(vec![
        (
            Value::Text(FIELD_VERSION.into()),
            Value::Integer(ENVELOPE_VERSION.into()),
        ),
        (
            Value::Text(FIELD_KEY.into()),
            Value::Text(envelope.key.clone()),
        ),
        (
            Value::Text(FIELD_PAYLOAD.into()),
            Value::Bytes(envelope.payload.to_vec()),
        ),
    ]);

    let mut out = Vec::with_capacity(envelope.payload.len() + envelope.key.len() + 24);
    ciborium::into_writer(&map, &mut out).map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(out)
}

/// Decodes an envelope from CBOR bytes.
///
/// The whole input must be exactly one envelope: trailing bytes, missing or
/// mistyped fields, and versions newer than [`ENVELOPE_VERSION`] are errors.
///
/// # Errors
///
/// Returns a [`CodecError`] describing the first problem found.
pub fn decode_envelope(bytes: &[u8]) -> CodecResult<WireEnvelope> {
    let mut reader = bytes;
    let value: Value = ciborium::from_reader(&mut reader)
        .map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    if !reader.is_empty() {
        return Err(CodecError::invalid_structure(format!(
            "{} trailing bytes after envelope",
            reader.len()
        )));
    }

    let Value::Map(fields) = value else {
        return Err(CodecError::invalid_structure("expected map"));
    };

    let get_field = |name: &str| {
        fields
            .iter()
            .find(|(k, _)| k.as_text() == Some(name))
            .map(|(_, v)| v)
    };

    let version = get_field(FIELD_VERSION)
        .and_then(Value::as_integer)
        .map(i128::from)
        .ok_or_else(|| CodecError::invalid_structure("missing version"))?;
    if !(1..=i128::from(ENVELOPE_VERSION)).contains(&version) {
        return Err(CodecError::UnsupportedVersion {
            found: version,
            supported: ENVELOPE_VERSION,
        });
    }

    let key = get_field(FIELD_KEY)
        .and_then(Value::as_text)
        .ok_or_else(|| CodecError::invalid_structure("missing key"))?;
    if key.is_empty() {
        return Err(CodecError::invalid_structure("empty key"));
    }

    let payload = get_field(FIELD_PAYLOAD)
        .and_then(Value::as_bytes)
        .ok_or_else(|| CodecError::invalid_structure("missing payload"))?;

    Ok(WireEnvelope::new(key, payload.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn roundtrip_sensor_envelope() {
        let envelope = WireEnvelope::new("accelerometer", vec![1, 2, 3, 4]);
        let bytes = envelope.encode().unwrap();
        assert_eq!(WireEnvelope::decode(&bytes).unwrap(), envelope);
    }

    #[test]
    fn empty_payload_is_allowed() {
        let envelope = WireEnvelope::new("control/ping", Vec::new());
        let bytes = encode_envelope(&envelope).unwrap();
        assert_eq!(decode_envelope(&bytes).unwrap(), envelope);
    }

    #[test]
    fn empty_key_is_rejected_on_encode() {
        let envelope = WireEnvelope::new("", vec![1]);
        assert!(matches!(
            encode_envelope(&envelope),
            Err(CodecError::EncodingFailed { .. })
        ));
    }

    #[test]
    fn non_utf8_key_is_rejected() {
        let result = WireEnvelope::from_raw_key(vec![0xff, 0xfe], vec![1]);
        assert_eq!(result, Err(CodecError::InvalidUtf8));
    }

    #[test]
    fn encoding_is_deterministic() {
        let envelope = WireEnvelope::new("heart_rate", vec![9; 32]);
        assert_eq!(envelope.encode().unwrap(), envelope.encode().unwrap());
    }

    #[test]
    fn truncated_input_fails() {
        let bytes = WireEnvelope::new("gyroscope", vec![7; 40]).encode().unwrap();
        for cut in [0, 1, bytes.len() / 2, bytes.len() - 1] {
            let err = decode_envelope(&bytes[..cut]).unwrap_err();
            assert!(err.is_malformed_input(), "cut at {cut}: {err:?}");
        }
    }

    #[test]
    fn trailing_bytes_fail() {
        let mut bytes = WireEnvelope::new("gravity", vec![1]).encode().unwrap();
        bytes.push(0x00);
        assert!(matches!(
            decode_envelope(&bytes),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    fn write(value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        ciborium::into_writer(value, &mut out).unwrap();
        out
    }

    #[test]
    fn non_map_fails() {
        let bytes = write(&Value::Array(vec![Value::Text("key".into())]));
        assert!(matches!(
            decode_envelope(&bytes),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn mistyped_payload_fails() {
        let bytes = write(&Value::Map(vec![
            (Value::Text("v".into()), Value::Integer(1.into())),
            (Value::Text("key".into()), Value::Text("distance".into())),
            (Value::Text("payload".into()), Value::Text("not bytes".into())),
        ]));
        assert!(matches!(
            decode_envelope(&bytes),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn newer_version_fails() {
        let bytes = write(&Value::Map(vec![
            (Value::Text("v".into()), Value::Integer(2.into())),
            (Value::Text("key".into()), Value::Text("distance".into())),
            (Value::Text("payload".into()), Value::Bytes(vec![1])),
        ]));
        assert_eq!(
            decode_envelope(&bytes),
            Err(CodecError::UnsupportedVersion {
                found: 2,
                supported: 1
            })
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let bytes = write(&Value::Map(vec![
            (Value::Text("v".into()), Value::Integer(1.into())),
            (Value::Text("key".into()), Value::Text("distance".into())),
            (Value::Text("payload".into()), Value::Bytes(vec![5, 6])),
            (Value::Text("priority".into()), Value::Integer(3.into())),
        ]));
        assert_eq!(
            decode_envelope(&bytes).unwrap(),
            WireEnvelope::new("distance", vec![5, 6])
        );
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            key in "[a-z_/]{1,24}",
            payload in prop::collection::vec(any::<u8>(), 0..512),
        ) {
            let envelope = WireEnvelope::new(key, payload);
            let bytes = encode_envelope(&envelope).unwrap();
            prop_assert_eq!(decode_envelope(&bytes).unwrap(), envelope);
        }

        #[test]
        fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
            let _ = decode_envelope(&bytes);
        }
    }
}
