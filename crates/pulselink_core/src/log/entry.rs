//! Log entry types and framing.
//!
//! Every entry is framed as
//!
//! ```text
//! magic "PLQ1" (4) | version u16 LE | type u8 | len u32 LE | payload (len) | crc32 LE
//! ```
//!
//! with the CRC taken over everything before it.

use crate::error::{CoreError, CoreResult};
use crate::types::RecordId;

/// Magic bytes opening every entry.
pub const LOG_MAGIC: [u8; 4] = *b"PLQ1";

/// Current entry format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub const HEADER_SIZE: usize = 11;

/// Trailing checksum size.
pub const CRC_SIZE: usize = 4;

/// Largest payload a single entry can carry.
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

/// Type byte of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryType {
    /// Identifies the store; first entry of every log.
    Header = 1,
    /// Adds records.
    Append = 2,
    /// Deletes records.
    Remove = 3,
    /// Deletes every record.
    Clear = 4,
}

impl EntryType {
    /// Converts a byte to an entry type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Header),
            2 => Some(Self::Append),
            3 => Some(Self::Remove),
            4 => Some(Self::Clear),
            _ => None,
        }
    }

    /// Converts the entry type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One mutation recorded in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// Store identity.
    Header {
        /// Random id chosen when the store was created.
        store_id: [u8; 16],
    },
    /// Records added together; all of them or none survive.
    Append {
        /// Ids and blobs, in insertion order.
        records: Vec<(RecordId, Vec<u8>)>,
    },
    /// Records deleted together.
    Remove {
        /// Deleted ids.
        ids: Vec<RecordId>,
    },
    /// Every record deleted.
    Clear,
}

impl LogEntry {
    /// Returns the entry type.
    #[must_use]
    pub fn entry_type(&self) -> EntryType {
        match self {
            Self::Header { .. } => EntryType::Header,
            Self::Append { .. } => EntryType::Append,
            Self::Remove { .. } => EntryType::Remove,
            Self::Clear => EntryType::Clear,
        }
    }

    /// Serializes the payload (without framing).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecordTooLarge`] if a blob or the whole payload
    /// does not fit a 32-bit length.
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Self::Header { store_id } => buf.extend_from_slice(store_id),
            Self::Append { records } => {
                put_count(&mut buf, records.len())?;
                for (id, data) in records {
                    let len = u32::try_from(data.len())
                        .map_err(|_| CoreError::RecordTooLarge { len: data.len() })?;
                    buf.extend_from_slice(id.as_bytes());
                    buf.extend_from_slice(&len.to_le_bytes());
                    buf.extend_from_slice(data);
                }
            }
            Self::Remove { ids } => {
                put_count(&mut buf, ids.len())?;
                for id in ids {
                    buf.extend_from_slice(id.as_bytes());
                }
            }
            Self::Clear => {}
        }

        if buf.len() > MAX_PAYLOAD_SIZE {
            return Err(CoreError::RecordTooLarge { len: buf.len() });
        }
        Ok(buf)
    }

    /// Deserializes a payload of the given type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] if the payload is short, has
    /// trailing bytes, or does not match the type.
    pub fn decode_payload(entry_type: EntryType, payload: &[u8]) -> CoreResult<Self> {
        let mut reader = PayloadReader::new(payload);
        let entry = match entry_type {
            EntryType::Header => Self::Header {
                store_id: reader.id_bytes()?,
            },
            EntryType::Append => {
                let count = reader.u32()? as usize;
                let mut records = Vec::with_capacity(count.min(payload.len() / 20));
                for _ in 0..count {
                    let id = RecordId::from_bytes(reader.id_bytes()?);
                    let len = reader.u32()? as usize;
                    records.push((id, reader.bytes(len)?.to_vec()));
                }
                Self::Append { records }
            }
            EntryType::Remove => {
                let count = reader.u32()? as usize;
                let mut ids = Vec::with_capacity(count.min(payload.len() / 16));
                for _ in 0..count {
                    ids.push(RecordId::from_bytes(reader.id_bytes()?));
                }
                Self::Remove { ids }
            }
            EntryType::Clear => Self::Clear,
        };
        reader.finish()?;
        Ok(entry)
    }

    /// Encodes the full framed entry.
    ///
    /// # Errors
    ///
    /// Propagates [`LogEntry::encode_payload`] errors.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        buf.extend_from_slice(&LOG_MAGIC);
        buf.extend_from_slice(&LOG_VERSION.to_le_bytes());
        buf.push(self.entry_type().as_byte());
        // Length fits: encode_payload caps it at MAX_PAYLOAD_SIZE.
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&payload);
        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Decodes one complete framed entry.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidFormat`] on bad magic, version, type or length
    /// - [`CoreError::ChecksumMismatch`] if the CRC does not match
    pub fn decode(frame: &[u8]) -> CoreResult<Self> {
        let header = FrameHeader::parse(frame)?;
        let expected_len = HEADER_SIZE + header.payload_len + CRC_SIZE;
        if frame.len() != expected_len {
            return Err(CoreError::invalid_format(format!(
                "entry length {} does not match declared {expected_len}",
                frame.len()
            )));
        }
        verify_crc(frame)?;
        Self::decode_payload(header.entry_type, &frame[HEADER_SIZE..HEADER_SIZE + header.payload_len])
    }

    /// Where each appended blob sits relative to the start of the framed
    /// entry, as `(id, offset, len)`. Empty for non-append entries.
    #[must_use]
    pub fn record_layout(&self) -> Vec<(RecordId, u64, usize)> {
        let Self::Append { records } = self else {
            return Vec::new();
        };
        let mut pos = (HEADER_SIZE + 4) as u64;
        records
            .iter()
            .map(|(id, data)| {
                pos += (RecordId::LEN + 4) as u64;
                let slot = (*id, pos, data.len());
                pos += data.len() as u64;
                slot
            })
            .collect()
    }
}

/// Parsed fixed-size part of a frame.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub entry_type: EntryType,
    pub payload_len: usize,
}

impl FrameHeader {
    /// Parses the first [`HEADER_SIZE`] bytes of `bytes`.
    pub(crate) fn parse(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(CoreError::invalid_format("entry header too short"));
        }
        if bytes[0..4] != LOG_MAGIC {
            return Err(CoreError::invalid_format("invalid magic"));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != LOG_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported log version {version}"
            )));
        }
        let entry_type = EntryType::from_byte(bytes[6])
            .ok_or_else(|| CoreError::invalid_format(format!("unknown entry type {}", bytes[6])))?;
        let payload_len = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]) as usize;
        Ok(Self {
            entry_type,
            payload_len,
        })
    }

    /// Size of the whole framed entry.
    pub(crate) fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload_len + CRC_SIZE
    }
}

/// Checks the trailing CRC of a complete frame.
pub(crate) fn verify_crc(frame: &[u8]) -> CoreResult<()> {
    let split = frame.len().saturating_sub(CRC_SIZE);
    let (body, tail) = frame.split_at(split);
    let expected = match tail {
        [a, b, c, d] => u32::from_le_bytes([*a, *b, *c, *d]),
        _ => return Err(CoreError::invalid_format("entry too short for checksum")),
    };
    let actual = compute_crc32(body);
    if expected != actual {
        return Err(CoreError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

fn put_count(buf: &mut Vec<u8>, count: usize) -> CoreResult<()> {
    let count = u32::try_from(count).map_err(|_| CoreError::RecordTooLarge { len: count })?;
    buf.extend_from_slice(&count.to_le_bytes());
    Ok(())
}

struct PayloadReader<'a> {
    payload: &'a [u8],
    cursor: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self { payload, cursor: 0 }
    }

    fn bytes(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .cursor
            .checked_add(len)
            .filter(|end| *end <= self.payload.len())
            .ok_or_else(|| CoreError::invalid_format("unexpected end of payload"))?;
        let slice = &self.payload[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let bytes = self.bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn id_bytes(&mut self) -> CoreResult<[u8; 16]> {
        let bytes = self.bytes(RecordId::LEN)?;
        bytes
            .try_into()
            .map_err(|_| CoreError::invalid_format("invalid record id"))
    }

    fn finish(self) -> CoreResult<()> {
        if self.cursor != self.payload.len() {
            return Err(CoreError::invalid_format(format!(
                "{} trailing payload bytes",
                self.payload.len() - self.cursor
            )));
        }
        Ok(())
    }
}

/// Computes the IEEE CRC32 of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    !data.iter().fold(0xFFFF_FFFF_u32, |crc, &byte| {
        (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize]
    })
}
