//! Error2 / error-table section: the acquisition-errors range list (§4.8).

use crate::checksum::adler32;
use crate::endian::{read_u32_le, read_u64_le, write_u32_le, write_u64_le};
use crate::error::{Error, Result};
use crate::sector_range::SectorRangeList;

const V1_HEADER_SIZE: usize = 208; // number_of_entries[4] + unknown[200] + checksum[4]
const V1_ENTRY_SIZE: usize = 8; // start_sector[4] + number_of_sectors[4]
const V1_FOOTER_SIZE: usize = 4;

const V2_HEADER_SIZE: usize = 32; // number_of_entries[4] + unknown[12] + checksum[4] + padding[12]
const V2_ENTRY_SIZE: usize = 16; // start_sector[8] + number_of_sectors[4] + padding[4]
const V2_FOOTER_SIZE: usize = 16; // checksum[4] + padding[12]

/// Parses a v1 error2 section payload, replacing `errors`'s contents with
/// the parsed ranges (§4.8's read contract: "empties the list and inserts
/// each range").
pub fn read_error2_v1(payload: &[u8], errors: &mut SectorRangeList) -> Result<()> {
    if payload.len() < V1_HEADER_SIZE {
        return Err(Error::truncated("error2 header (v1)", 0));
    }
    let number_of_entries = read_u32_le(payload, 0)? as usize;
    let stored_header_checksum = read_u32_le(payload, V1_HEADER_SIZE - 4)?;
    let computed_header_checksum = adler32(&payload[..V1_HEADER_SIZE - 4], 1);
    if stored_header_checksum != computed_header_checksum {
        return Err(Error::checksum_mismatch("error2 header (v1)", stored_header_checksum, computed_header_checksum));
    }

    let entries_start = V1_HEADER_SIZE;
    let entries_bytes = number_of_entries * V1_ENTRY_SIZE;
    let entries_end = entries_start + entries_bytes;
    if payload.len() < entries_end + V1_FOOTER_SIZE {
        return Err(Error::truncated("error2 entries (v1)", entries_start as u64));
    }
    let entry_block = &payload[entries_start..entries_end];

    let stored_footer_checksum = read_u32_le(payload, entries_end)?;
    let computed_footer_checksum = adler32(entry_block, 1);
    if stored_footer_checksum != computed_footer_checksum {
        return Err(Error::checksum_mismatch("error2 footer (v1)", stored_footer_checksum, computed_footer_checksum));
    }

    errors.clear();
    for i in 0..number_of_entries {
        let base = i * V1_ENTRY_SIZE;
        let start_sector = read_u32_le(entry_block, base)? as u64;
        let number_of_sectors = read_u32_le(entry_block, base + 4)? as u64;
        errors.append(start_sector, number_of_sectors)?;
    }
    Ok(())
}

/// Serializes `errors` into a v1 error2 section payload.
pub fn write_error2_v1(errors: &SectorRangeList) -> Vec<u8> {
    let mut payload = vec![0u8; V1_HEADER_SIZE];
    write_u32_le(&mut payload, 0, errors.len() as u32);
    let header_checksum = adler32(&payload[..V1_HEADER_SIZE - 4], 1);
    write_u32_le(&mut payload, V1_HEADER_SIZE - 4, header_checksum);

    let mut entry_block = Vec::with_capacity(errors.len() * V1_ENTRY_SIZE);
    for range in errors.iter() {
        let mut entry = [0u8; V1_ENTRY_SIZE];
        write_u32_le(&mut entry, 0, range.start_sector() as u32);
        write_u32_le(&mut entry, 4, range.number_of_sectors() as u32);
        entry_block.extend_from_slice(&entry);
    }
    let footer_checksum = adler32(&entry_block, 1);
    payload.extend_from_slice(&entry_block);
    payload.extend_from_slice(&footer_checksum.to_le_bytes());
    payload
}

/// Parses a v2 error-table section payload.
pub fn read_error2_v2(payload: &[u8], errors: &mut SectorRangeList) -> Result<()> {
    if payload.len() < V2_HEADER_SIZE {
        return Err(Error::truncated("error-table header (v2)", 0));
    }
    let number_of_entries = read_u32_le(payload, 0)? as usize;
    let stored_header_checksum = read_u32_le(payload, 16)?;
    let computed_header_checksum = adler32(&payload[..16], 1);
    if stored_header_checksum != computed_header_checksum {
        return Err(Error::checksum_mismatch("error-table header (v2)", stored_header_checksum, computed_header_checksum));
    }

    let entries_start = V2_HEADER_SIZE;
    let entries_bytes = number_of_entries * V2_ENTRY_SIZE;
    let entries_end = entries_start + entries_bytes;
    if payload.len() < entries_end + V2_FOOTER_SIZE {
        return Err(Error::truncated("error-table entries (v2)", entries_start as u64));
    }
    let entry_block = &payload[entries_start..entries_end];

    let stored_footer_checksum = read_u32_le(payload, entries_end)?;
    let computed_footer_checksum = adler32(entry_block, 1);
    if stored_footer_checksum != computed_footer_checksum {
        return Err(Error::checksum_mismatch("error-table footer (v2)", stored_footer_checksum, computed_footer_checksum));
    }

    errors.clear();
    for i in 0..number_of_entries {
        let base = i * V2_ENTRY_SIZE;
        let start_sector = read_u64_le(entry_block, base)?;
        let number_of_sectors = read_u32_le(entry_block, base + 8)? as u64;
        errors.append(start_sector, number_of_sectors)?;
    }
    Ok(())
}

/// Serializes `errors` into a v2 error-table section payload.
pub fn write_error2_v2(errors: &SectorRangeList) -> Vec<u8> {
    let mut payload = vec![0u8; V2_HEADER_SIZE];
    write_u32_le(&mut payload, 0, errors.len() as u32);
    let header_checksum = adler32(&payload[..16], 1);
    write_u32_le(&mut payload, 16, header_checksum);

    let mut entry_block = Vec::with_capacity(errors.len() * V2_ENTRY_SIZE);
    for range in errors.iter() {
        let mut entry = [0u8; V2_ENTRY_SIZE];
        write_u64_le(&mut entry, 0, range.start_sector());
        write_u32_le(&mut entry, 8, range.number_of_sectors() as u32);
        entry_block.extend_from_slice(&entry);
    }
    let footer_checksum = adler32(&entry_block, 1);
    payload.extend_from_slice(&entry_block);
    payload.extend_from_slice(&footer_checksum.to_le_bytes());
    payload.extend_from_slice(&[0u8; 12]);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_round_trip_preserves_ranges() {
        let mut errors = SectorRangeList::new();
        errors.append(100, 4).unwrap();
        errors.append(500, 1).unwrap();

        let payload = write_error2_v1(&errors);
        let mut parsed = SectorRangeList::new();
        read_error2_v1(&payload, &mut parsed).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get_range(0).unwrap().start_sector(), 100);
        assert_eq!(parsed.get_range(1).unwrap().start_sector(), 500);
    }

    #[test]
    fn v1_read_empties_list_before_inserting() {
        let mut errors = SectorRangeList::new();
        errors.append(9999, 1).unwrap();

        let payload = write_error2_v1(&SectorRangeList::new());
        read_error2_v1(&payload, &mut errors).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn v1_footer_checksum_mismatch_is_rejected() {
        let mut errors = SectorRangeList::new();
        errors.append(1, 1).unwrap();
        let mut payload = write_error2_v1(&errors);
        let last = payload.len() - 1;
        payload[last] ^= 0xff;

        let mut parsed = SectorRangeList::new();
        let result = read_error2_v1(&payload, &mut parsed);
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn v2_round_trip_preserves_ranges() {
        let mut errors = SectorRangeList::new();
        errors.append(1_000_000, 64).unwrap();

        let payload = write_error2_v2(&errors);
        let mut parsed = SectorRangeList::new();
        read_error2_v2(&payload, &mut parsed).unwrap();

        assert_eq!(parsed.get_range(0).unwrap(), errors.get_range(0).unwrap());
    }
}
