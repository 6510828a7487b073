//! Sectors section: raw chunk-data span plus per-chunk Adler-32 (§4.6).

use crate::checksum::adler32;
use crate::error::{Error, Result};

/// Where the raw chunk bytes for a `sectors` section begin and how long
/// the span is. The dispatcher records this and skips past it; streaming
/// compressed chunks into the span is the caller's chunk pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorsSpan {
    pub start_offset: u64,
    pub length: u64,
}

impl SectorsSpan {
    pub fn new(start_offset: u64, length: u64) -> Self {
        SectorsSpan { start_offset, length }
    }

    pub fn end_offset(&self) -> u64 {
        self.start_offset + self.length
    }
}

/// Appends a trailing Adler-32 to a chunk's compressed (or stored) bytes,
/// used when the `write_crc` flag is set for this image (§4.6).
pub fn append_chunk_checksum(chunk_bytes: &mut Vec<u8>) {
    let checksum = adler32(chunk_bytes, 1);
    chunk_bytes.extend_from_slice(&checksum.to_le_bytes());
}

/// Splits `raw` into the chunk payload and its trailing Adler-32, verifying
/// the checksum. `raw` must be exactly payload-plus-4-bytes long.
pub fn split_and_verify_chunk_checksum(raw: &[u8]) -> Result<(&[u8], bool)> {
    if raw.len() < 4 {
        return Err(Error::truncated("chunk trailing checksum", 0));
    }
    let (payload, checksum_bytes) = raw.split_at(raw.len() - 4);
    let stored = u32::from_le_bytes(checksum_bytes.try_into().unwrap());
    let computed = adler32(payload, 1);
    Ok((payload, stored == computed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_end_offset_adds_length() {
        let span = SectorsSpan::new(0x2000, 0x8004);
        assert_eq!(span.end_offset(), 0x2000 + 0x8004);
    }

    #[test]
    fn append_then_split_round_trips_and_verifies() {
        let mut bytes = b"compressed-chunk-bytes".to_vec();
        append_chunk_checksum(&mut bytes);

        let (payload, valid) = split_and_verify_chunk_checksum(&bytes).unwrap();
        assert_eq!(payload, b"compressed-chunk-bytes");
        assert!(valid);
    }

    #[test]
    fn corrupted_trailing_checksum_fails_verification() {
        let mut bytes = b"compressed-chunk-bytes".to_vec();
        append_chunk_checksum(&mut bytes);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        let (_payload, valid) = split_and_verify_chunk_checksum(&bytes).unwrap();
        assert!(!valid);
    }
}
