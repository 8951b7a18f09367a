//! Whole-buffer compression for transfer units.
//!
//! Uses the LZ4 block format with a 4-byte little-endian size prefix, so the
//! receiver knows how much to allocate before inflating.

use crate::error::{CodecError, CodecResult};
use crate::framing::{combine, split};
use bytes::Bytes;

/// Largest decompressed size accepted from a peer.
pub const MAX_DECOMPRESSED_LEN: usize = 256 * 1024 * 1024;

const SIZE_PREFIX_LEN: usize = 4;

/// Compresses `data`.
///
/// # Errors
///
/// Returns [`CodecError::CompressionFailed`] if the input is too large for
/// the block format.
pub fn compress(data: &[u8]) -> CodecResult<Vec<u8>> {
    lz4::block::compress(data, None, true).map_err(|e| CodecError::CompressionFailed {
        message: e.to_string(),
    })
}

/// Inverts [`compress`].
///
/// # Errors
///
/// Returns [`CodecError::DecompressionFailed`] if the prefix is missing,
/// declares a size above [`MAX_DECOMPRESSED_LEN`], or the block is corrupt.
pub fn decompress(data: &[u8]) -> CodecResult<Vec<u8>> {
    if data.len() < SIZE_PREFIX_LEN {
        return Err(CodecError::decompression_failed("missing size prefix"));
    }

    let declared = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let declared = usize::try_from(declared)
        .map_err(|_| CodecError::decompression_failed("negative size prefix"))?;
    if declared > MAX_DECOMPRESSED_LEN {
        return Err(CodecError::decompression_failed(format!(
            "declared size {declared} exceeds limit of {MAX_DECOMPRESSED_LEN}"
        )));
    }
    if declared == 0 {
        // Only the exact block produced for empty input is accepted.
        if data != compress(&[])?.as_slice() {
            return Err(CodecError::decompression_failed(
                "zero size prefix followed by a non-empty block",
            ));
        }
        return Ok(Vec::new());
    }

    let out = lz4::block::decompress(data, None)
        .map_err(|e| CodecError::decompression_failed(e.to_string()))?;
    if out.len() != declared {
        return Err(CodecError::decompression_failed(format!(
            "inflated to {} bytes, prefix declared {declared}",
            out.len()
        )));
    }
    Ok(out)
}

/// Packs and compresses blobs into one transfer unit.
///
/// # Errors
///
/// Propagates framing and compression errors.
pub fn prepare_for_transfer<B: AsRef<[u8]>>(files: &[B]) -> CodecResult<Vec<u8>> {
    compress(&combine(files)?)
}

/// Decompresses and splits a received transfer unit.
///
/// # Errors
///
/// Returns [`CodecError::DecompressionFailed`] or [`CodecError::FrameOverrun`].
pub fn process_received(data: &[u8]) -> CodecResult<Vec<Bytes>> {
    split(Bytes::from(decompress(data)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn repetitive_sensor_data_shrinks() {
        let data: Vec<u8> = (0..4096).map(|i| (i % 16) as u8).collect();
        let packed = compress(&data).unwrap();
        assert!(packed.len() < data.len() / 4);
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn empty_input_roundtrips() {
        let packed = compress(&[]).unwrap();
        assert!(decompress(&packed).unwrap().is_empty());
    }

    #[test]
    fn zero_prefix_with_garbage_fails() {
        let bogus = [0, 0, 0, 0, 0xde, 0xad, 0xbe, 0xef];
        assert!(matches!(
            decompress(&bogus),
            Err(CodecError::DecompressionFailed { .. })
        ));
        assert!(matches!(
            process_received(&bogus),
            Err(CodecError::DecompressionFailed { .. })
        ));
        assert!(decompress(&[0, 0, 0, 0]).is_err());
    }

    #[test]
    fn short_input_fails() {
        assert!(matches!(
            decompress(&[1, 0]),
            Err(CodecError::DecompressionFailed { .. })
        ));
    }

    #[test]
    fn absurd_size_prefix_fails_without_allocating() {
        let mut bogus = vec![0xff, 0xff, 0xff, 0x7f];
        bogus.extend_from_slice(&[0u8; 8]);
        assert!(matches!(
            decompress(&bogus),
            Err(CodecError::DecompressionFailed { .. })
        ));
    }

    #[test]
    fn corrupt_block_fails() {
        let data = vec![42u8; 1024];
        let mut packed = compress(&data).unwrap();
        let last = packed.len() - 1;
        packed.truncate(last - 2);
        assert!(decompress(&packed).is_err());
    }

    #[test]
    fn transfer_unit_roundtrip() {
        let files = vec![b"accelerometer".to_vec(), Vec::new(), vec![0u8; 300]];
        let unit = prepare_for_transfer(&files).unwrap();
        assert_eq!(process_received(&unit).unwrap(), files);
    }

    proptest! {
        #[test]
        fn decompress_inverts_compress(data in prop::collection::vec(any::<u8>(), 0..2048)) {
            let packed = compress(&data).unwrap();
            prop_assert_eq!(decompress(&packed).unwrap(), data);
        }

        #[test]
        fn process_received_inverts_prepare(
            files in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..128), 0..8),
        ) {
            let unit = prepare_for_transfer(&files).unwrap();
            prop_assert_eq!(process_received(&unit).unwrap(), files);
        }
    }
}
