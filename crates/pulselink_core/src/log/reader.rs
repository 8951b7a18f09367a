//! Sequential scan over the entry log.

use crate::error::{CoreError, CoreResult};
use crate::log::entry::{verify_crc, FrameHeader, LogEntry, HEADER_SIZE, LOG_MAGIC};
use pulselink_storage::StorageBackend;

/// One step of a log scan.
#[derive(Debug)]
pub(crate) enum Scanned {
    /// A complete, verified entry starting at `offset`.
    Entry {
        offset: u64,
        len: u64,
        entry: LogEntry,
    },
    /// An incomplete or damaged final entry. Everything from `valid_len` on
    /// is a torn write and should be cut.
    TornTail { valid_len: u64 },
}

/// Reads entries one at a time from the start of the log.
///
/// - A frame that runs past the end of the log is a torn tail, unless a
///   complete, verified frame starts somewhere after it, in which case its
///   length word is damaged and the log is corrupt
/// - A checksum mismatch on the last frame is a torn tail
/// - A checksum mismatch, bad magic or bad payload anywhere else is
///   [`CoreError::LogCorruption`]
///
/// The iterator stops after the first torn tail or error.
pub(crate) struct LogReader<'a> {
    backend: &'a dyn StorageBackend,
    size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> LogReader<'a> {
    pub(crate) fn new(backend: &'a dyn StorageBackend) -> CoreResult<Self> {
        Ok(Self {
            size: backend.size()?,
            backend,
            offset: 0,
            finished: false,
        })
    }

    fn read_next(&mut self) -> CoreResult<Option<Scanned>> {
        let offset = self.offset;
        let remaining = self.size - offset;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < HEADER_SIZE as u64 {
            return Ok(Some(Scanned::TornTail { valid_len: offset }));
        }

        let header_bytes = self.backend.read_at(offset, HEADER_SIZE)?;
        let header = FrameHeader::parse(&header_bytes)
            .map_err(|e| CoreError::log_corruption(offset, e.to_string()))?;
        let frame_len = header.frame_len() as u64;
        if frame_len > remaining {
            if let Some(later) = self.find_frame_after(offset)? {
                return Err(CoreError::log_corruption(
                    offset,
                    format!(
                        "entry length {frame_len} runs past end of log, but a valid entry follows at {later}"
                    ),
                ));
            }
            return Ok(Some(Scanned::TornTail { valid_len: offset }));
        }

        let frame = self.backend.read_at(offset, header.frame_len())?;
        let at_tail = frame_len == remaining;
        match verify_crc(&frame) {
            Ok(()) => {}
            Err(CoreError::ChecksumMismatch { .. }) if at_tail => {
                return Ok(Some(Scanned::TornTail { valid_len: offset }));
            }
            Err(e) => return Err(CoreError::log_corruption(offset, e.to_string())),
        }

        let payload = &frame[HEADER_SIZE..HEADER_SIZE + header.payload_len];
        let entry = LogEntry::decode_payload(header.entry_type, payload)
            .map_err(|e| CoreError::log_corruption(offset, e.to_string()))?;
        self.offset += frame_len;
        Ok(Some(Scanned::Entry {
            offset,
            len: frame_len,
            entry,
        }))
    }
}

impl LogReader<'_> {
    /// Looks for a complete frame with a valid checksum starting after
    /// `offset`. A torn write is always the last thing in the log.
    fn find_frame_after(&self, offset: u64) -> CoreResult<Option<u64>> {
        let start = offset + 1;
        let rest_len = usize::try_from(self.size - start)
            .map_err(|_| CoreError::log_corruption(offset, "log too large to scan"))?;
        let rest = self.backend.read_at(start, rest_len)?;

        let mut pos = 0;
        while pos + HEADER_SIZE <= rest.len() {
            if rest[pos..pos + LOG_MAGIC.len()] == LOG_MAGIC {
                if let Ok(header) = FrameHeader::parse(&rest[pos..]) {
                    let end = pos.saturating_add(header.frame_len());
                    if end <= rest.len() && verify_crc(&rest[pos..end]).is_ok() {
                        return Ok(Some(start + pos as u64));
                    }
                }
            }
            pos += 1;
        }
        Ok(None)
    }
}

impl Iterator for LogReader<'_> {
    type Item = CoreResult<Scanned>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(item @ Scanned::Entry { .. })) => Some(Ok(item)),
            Ok(Some(torn)) => {
                self.finished = true;
                Some(Ok(torn))
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordId;
    use pulselink_storage::InMemoryBackend;

    fn log_of(entries: &[LogEntry]) -> Vec<u8> {
        entries
            .iter()
            .flat_map(|e| e.encode().unwrap())
            .collect()
    }

    fn entries() -> Vec<LogEntry> {
        vec![
            LogEntry::Header {
                store_id: [1u8; 16],
            },
            LogEntry::Append {
                records: vec![(RecordId::new(), b"first".to_vec())],
            },
            LogEntry::Append {
                records: vec![(RecordId::new(), b"second".to_vec())],
            },
        ]
    }

    fn scan(bytes: Vec<u8>) -> Vec<CoreResult<Scanned>> {
        let backend = InMemoryBackend::with_data(bytes);
        LogReader::new(&backend).unwrap().collect()
    }

    #[test]
    fn reads_all_entries_in_order() {
        let expected = entries();
        let items = scan(log_of(&expected));
        assert_eq!(items.len(), 3);
        let mut next_offset = 0;
        for (item, want) in items.into_iter().zip(&expected) {
            match item.unwrap() {
                Scanned::Entry { offset, len, entry } => {
                    assert_eq!(offset, next_offset);
                    assert_eq!(&entry, want);
                    next_offset += len;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn empty_log_yields_nothing() {
        assert!(scan(Vec::new()).is_empty());
    }

    #[test]
    fn partial_last_entry_is_torn_tail() {
        let all = entries();
        let good = log_of(&all[..2]);
        let mut bytes = log_of(&all);
        bytes.truncate(bytes.len() - 3);

        let items = scan(bytes);
        assert_eq!(items.len(), 3);
        match items.last().unwrap() {
            Ok(Scanned::TornTail { valid_len }) => assert_eq!(*valid_len, good.len() as u64),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_header_is_torn_tail() {
        let all = entries();
        let mut bytes = log_of(&all);
        let valid = bytes.len() as u64;
        bytes.extend_from_slice(b"PLQ");
        match scan(bytes).last().unwrap() {
            Ok(Scanned::TornTail { valid_len }) => assert_eq!(*valid_len, valid),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_crc_on_last_entry_is_torn_tail() {
        let mut bytes = log_of(&entries());
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            scan(bytes).last().unwrap(),
            Ok(Scanned::TornTail { .. })
        ));
    }

    #[test]
    fn bad_crc_in_middle_is_corruption() {
        let all = entries();
        let first_len = log_of(&all[..1]).len();
        let mut bytes = log_of(&all);
        // Last payload byte of the second entry.
        let second_len = log_of(&all[1..2]).len();
        bytes[first_len + second_len - 5] ^= 0xFF;

        let items = scan(bytes);
        assert!(matches!(
            items.last().unwrap(),
            Err(CoreError::LogCorruption { offset, .. }) if *offset == first_len as u64
        ));
    }

    #[test]
    fn oversized_length_before_valid_entries_is_corruption() {
        let all = entries();
        let first_len = log_of(&all[..1]).len();
        let mut bytes = log_of(&all);
        // High byte of the second entry's payload length.
        bytes[first_len + HEADER_SIZE - 1] = 0x7f;

        let items = scan(bytes);
        assert_eq!(items.len(), 2);
        assert!(matches!(
            items.last().unwrap(),
            Err(CoreError::LogCorruption { offset, .. }) if *offset == first_len as u64
        ));
    }

    #[test]
    fn oversized_length_on_last_entry_is_torn_tail() {
        let all = entries();
        let valid = log_of(&all[..2]).len();
        let mut bytes = log_of(&all);
        bytes[valid + HEADER_SIZE - 1] = 0x7f;

        match scan(bytes).last().unwrap() {
            Ok(Scanned::TornTail { valid_len }) => assert_eq!(*valid_len, valid as u64),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut bytes = log_of(&entries());
        bytes[0] = b'Z';
        assert!(matches!(
            scan(bytes).first().unwrap(),
            Err(CoreError::LogCorruption { offset: 0, .. })
        ));
    }
}
