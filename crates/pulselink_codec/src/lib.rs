//! # PulseLink Codec
//!
//! Wire formats shared by the wearable and the phone:
//!
//! - [`WireEnvelope`]: a `(key, payload)` pair written as a versioned CBOR map
//! - packed buffers: many blobs behind a header of 32-bit big-endian lengths
//! - LZ4 compression over a whole packed buffer
//!
//! ## Usage
//!
//! ```
//! use pulselink_codec::{prepare_for_transfer, process_received, WireEnvelope};
//!
//! let a = WireEnvelope::new("heart_rate", vec![1, 2, 3]).encode().unwrap();
//! let b = WireEnvelope::new("gyroscope", vec![4, 5]).encode().unwrap();
//!
//! let unit = prepare_for_transfer(&[a.clone(), b.clone()]).unwrap();
//! let blobs = process_received(&unit).unwrap();
//! assert_eq!(blobs, vec![a, b]);
//! ```
//!
//! Every decode path rejects malformed input as a whole; nothing is
//! partially trusted.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod compress;
mod envelope;
mod error;
mod framing;

pub use compress::{compress, decompress, prepare_for_transfer, process_received, MAX_DECOMPRESSED_LEN};
pub use envelope::{decode_envelope, encode_envelope, WireEnvelope, ENVELOPE_VERSION, MAX_PAYLOAD_LEN};
pub use error::{CodecError, CodecResult};
pub use framing::{combine, split, LENGTH_WORD_SIZE};

/// Encodes envelopes and packs them into one compressed transfer unit.
///
/// # Errors
///
/// Propagates envelope, framing and compression errors.
pub fn pack_envelopes(envelopes: &[WireEnvelope]) -> CodecResult<Vec<u8>> {
    let encoded = envelopes
        .iter()
        .map(encode_envelope)
        .collect::<CodecResult<Vec<_>>>()?;
    prepare_for_transfer(&encoded)
}

/// Inverts [`pack_envelopes`]. Fails as a whole if any envelope is malformed.
///
/// # Errors
///
/// Propagates decompression, framing and envelope errors.
pub fn unpack_envelopes(unit: &[u8]) -> CodecResult<Vec<WireEnvelope>> {
    process_received(unit)?
        .iter()
        .map(|blob| decode_envelope(blob))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_and_unpack_envelopes() {
        let envelopes = vec![
            WireEnvelope::new("accelerometer", vec![1; 64]),
            WireEnvelope::new("control/end", Vec::new()),
        ];
        let unit = pack_envelopes(&envelopes).unwrap();
        assert_eq!(unpack_envelopes(&unit).unwrap(), envelopes);
    }

    #[test]
    fn one_bad_envelope_rejects_the_unit() {
        let good = WireEnvelope::new("gravity", vec![1]).encode().unwrap();
        let unit = prepare_for_transfer(&[good, vec![0xff, 0x00]]).unwrap();
        assert!(unpack_envelopes(&unit).is_err());
    }
}
