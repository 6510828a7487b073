//! Delta-chunk section (Ex01): out-of-band uncompressed replacement for a
//! previously stored chunk (§4.7).

use crate::checksum::adler32;
use crate::chunk::ChunkDescriptor;
use crate::endian::{read_u32_le, write_u32_le};
use crate::error::{Error, Result};

const HEADER_SIZE: usize = 20; // chunk_index+1[4] + chunk_size[4] + "DELTA"[5] + pad[3] + checksum[4]
const MARKER: &[u8; 5] = b"DELTA";

/// Parsed delta-chunk header plus a view into the payload's replacement
/// bytes (uncompressed, per invariant 9).
pub struct DeltaChunk<'a> {
    pub chunk_index: usize,
    pub data: &'a [u8],
}

/// Parses a delta-chunk section payload, verifying the header checksum
/// (§4.7's read contract).
pub fn read_delta_chunk(payload: &[u8]) -> Result<DeltaChunk<'_>> {
    if payload.len() < HEADER_SIZE {
        return Err(Error::truncated("delta-chunk header", 0));
    }

    let stored_checksum = read_u32_le(payload, 16)?;
    let computed_checksum = adler32(&payload[..16], 1);
    if stored_checksum != computed_checksum {
        return Err(Error::checksum_mismatch("delta-chunk header", stored_checksum, computed_checksum));
    }

    let chunk_index_plus_one = read_u32_le(payload, 0)?;
    if chunk_index_plus_one == 0 {
        return Err(Error::FormatInvariant("delta-chunk index field is zero".into()));
    }
    let chunk_index = (chunk_index_plus_one - 1) as usize;
    let chunk_size = read_u32_le(payload, 4)? as usize;

    let marker = &payload[8..13];
    if marker != MARKER {
        return Err(Error::FormatInvariant(format!(
            "delta-chunk marker mismatch: expected \"DELTA\", found {:?}",
            marker
        )));
    }

    let data_end = HEADER_SIZE
        .checked_add(chunk_size)
        .ok_or_else(|| Error::OutOfBounds("delta-chunk data region overflows usize".into()))?;
    if payload.len() < data_end {
        return Err(Error::truncated("delta-chunk data", HEADER_SIZE as u64));
    }

    Ok(DeltaChunk {
        chunk_index,
        data: &payload[HEADER_SIZE..data_end],
    })
}

/// Serializes a delta-chunk section payload for `chunk_index`, embedding
/// `data` as the uncompressed replacement bytes.
pub fn write_delta_chunk(chunk_index: usize, data: &[u8]) -> Result<Vec<u8>> {
    let chunk_index_plus_one = u32::try_from(chunk_index + 1)
        .map_err(|_| Error::OutOfBounds("delta-chunk index does not fit in u32".into()))?;
    let chunk_size =
        u32::try_from(data.len()).map_err(|_| Error::OutOfBounds("delta-chunk data too large".into()))?;

    let mut payload = vec![0u8; HEADER_SIZE];
    write_u32_le(&mut payload, 0, chunk_index_plus_one);
    write_u32_le(&mut payload, 4, chunk_size);
    payload[8..13].copy_from_slice(MARKER);
    let checksum = adler32(&payload[..16], 1);
    write_u32_le(&mut payload, 16, checksum);
    payload.extend_from_slice(data);
    Ok(payload)
}

/// Builds the [`ChunkDescriptor`] override installed by a delta-chunk
/// section: always uncompressed and dirty, pointing at the bytes inside
/// this delta-chunk section itself (invariant 9).
pub fn descriptor_for_delta(segment: usize, data_offset: u64, data_len: u32) -> ChunkDescriptor {
    let mut descriptor = ChunkDescriptor::new(segment, data_offset, data_len, false);
    descriptor.dirty = true;
    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_write_then_read() {
        let data = b"replacement chunk bytes".to_vec();
        let payload = write_delta_chunk(41, &data).unwrap();

        let parsed = read_delta_chunk(&payload).unwrap();
        assert_eq!(parsed.chunk_index, 41);
        assert_eq!(parsed.data, &data[..]);
    }

    #[test]
    fn header_checksum_mismatch_is_rejected() {
        let mut payload = write_delta_chunk(0, b"x").unwrap();
        payload[16..20].copy_from_slice(&0xFFFFFFFFu32.to_le_bytes());

        let result = read_delta_chunk(&payload);
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn descriptor_override_is_uncompressed_and_dirty() {
        let descriptor = descriptor_for_delta(2, 0x4000, 0x8000);
        assert!(!descriptor.compressed);
        assert!(descriptor.dirty);
        assert_eq!(descriptor.segment, 2);
        assert_eq!(descriptor.offset, 0x4000);
    }
}
