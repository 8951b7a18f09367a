//! Multi-blob framing.
//!
//! A packed buffer is a header of 32-bit big-endian length words, one per
//! blob, immediately followed by the blobs themselves, with no padding:
//!
//! ```text
//! | len0 (4) | len1 (4) | ... | lenN-1 (4) | blob0 | blob1 | ... | blobN-1 |
//! ```
//!
//! The header carries no count. [`split`] walks the length words until the
//! header plus the declared blob sizes account for the whole buffer. For any
//! valid buffer the first such point is the real header end, because every
//! earlier stop is strictly shorter.

use crate::error::{CodecError, CodecResult};
use bytes::{BufMut, Bytes, BytesMut};

/// Size of one length word.
pub const LENGTH_WORD_SIZE: usize = 4;

/// Packs `files` into one buffer, preserving order.
///
/// # Errors
///
/// Returns [`CodecError::FrameTooLarge`] if a blob does not fit a 32-bit length.
pub fn combine<B: AsRef<[u8]>>(files: &[B]) -> CodecResult<Vec<u8>> {
    let body_len: usize = files.iter().map(|f| f.as_ref().len()).sum();
    let mut out = BytesMut::with_capacity(files.len() * LENGTH_WORD_SIZE + body_len);

    for (index, file) in files.iter().enumerate() {
        let len = file.as_ref().len();
        let word = u32::try_from(len).map_err(|_| CodecError::FrameTooLarge { index, len })?;
        out.put_u32(word);
    }
    for file in files {
        out.put_slice(file.as_ref());
    }

    Ok(out.to_vec())
}

/// Splits a packed buffer back into its blobs.
///
/// Blobs are zero-copy slices of `buffer`.
///
/// # Errors
///
/// Returns [`CodecError::FrameOverrun`] if the buffer ends inside a length
/// word, or if the declared sizes need more bytes than the buffer holds.
/// A damaged header is never silently truncated to a shorter list.
pub fn split(buffer: Bytes) -> CodecResult<Vec<Bytes>> {
    let total = buffer.len();
    let mut sizes = Vec::new();
    let mut header_len = 0usize;
    let mut body_len = 0usize;

    while header_len + body_len < total {
        let word_end = header_len + LENGTH_WORD_SIZE;
        if word_end > total {
            return Err(CodecError::FrameOverrun {
                offset: header_len,
                needed: word_end,
                available: total,
            });
        }

        let word = u32::from_be_bytes([
            buffer[header_len],
            buffer[header_len + 1],
            buffer[header_len + 2],
            buffer[header_len + 3],
        ]) as usize;
        header_len = word_end;
        body_len = body_len.saturating_add(word);
        sizes.push(word);

        let needed = header_len.saturating_add(body_len);
        if needed > total {
            return Err(CodecError::FrameOverrun {
                offset: header_len,
                needed,
                available: total,
            });
        }
    }

    let mut files = Vec::with_capacity(sizes.len());
    let mut offset = header_len;
    for size in sizes {
        files.push(buffer.slice(offset..offset + size));
        offset += size;
    }
    Ok(files)
}
