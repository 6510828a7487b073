//! Table section: offset-table header/entry/footer layouts and the
//! fill/correct/generate algorithms (§4.5).

use crate::checksum::adler32;
use crate::chunk::{ChunkDescriptor, ChunkGroup};
use crate::endian::{read_u32_le, read_u64_le, write_u32_le, write_u64_le};
use crate::error::{Error, Result};
use crate::format::{AcquisitionTarget, FormatVersion};

const V1_HEADER_SIZE: usize = 24;
const V1_ENTRY_SIZE: usize = 4;
const V2_HEADER_SIZE: usize = 36;
const V2_ENTRY_SIZE: usize = 16;
const COMPRESSED_BIT: u32 = 0x8000_0000;
const OFFSET_MASK: u32 = 0x7FFF_FFFF;

/// Whether a table's footer (Adler-32 over the entry block) is present.
/// Absent only for the original SMART format (§4.5 "Limits").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FooterPresence {
    Present,
    AbsentSmart,
}

/// Parses a v1 table section payload (header, entries, optional footer)
/// into a [`ChunkGroup`], per §4.5's fill algorithm.
///
/// `section_end` is the absolute end offset of the enclosing section, used
/// to size the final chunk when a v1 table carries no footer/size field.
/// `segment` is the segment-pool entry the chunk bytes physically live in.
pub fn read_table_v1(
    payload: &[u8],
    section_end: u64,
    segment: usize,
    first_chunk_number: usize,
    target: AcquisitionTarget,
    footer: FooterPresence,
) -> Result<ChunkGroup> {
    if payload.len() < V1_HEADER_SIZE {
        return Err(Error::truncated("table section header (v1)", 0));
    }

    let number_of_entries = read_u32_le(payload, 0)? as usize;
    let base_offset = read_u64_le(payload, 8)?;
    let stored_header_checksum = read_u32_le(payload, 20)?;
    let computed_header_checksum = adler32(&payload[..20], 1);
    if stored_header_checksum != computed_header_checksum {
        return Err(Error::checksum_mismatch(
            "table section header (v1)",
            stored_header_checksum,
            computed_header_checksum,
        ));
    }

    check_entry_limit(number_of_entries, target)?;

    let entries_start = V1_HEADER_SIZE;
    let entries_bytes = number_of_entries * V1_ENTRY_SIZE;
    let entries_end = entries_start
        .checked_add(entries_bytes)
        .ok_or_else(|| Error::OutOfBounds("table entries region overflows usize".into()))?;
    if payload.len() < entries_end {
        return Err(Error::truncated("table section entries (v1)", entries_start as u64));
    }
    let entry_block = &payload[entries_start..entries_end];

    if let FooterPresence::Present = footer {
        let footer_end = entries_end + 4;
        if payload.len() < footer_end {
            return Err(Error::truncated("table section footer (v1)", entries_end as u64));
        }
        let stored_footer_checksum = read_u32_le(payload, entries_end)?;
        let computed_footer_checksum = adler32(entry_block, 1);
        if stored_footer_checksum != computed_footer_checksum {
            return Err(Error::checksum_mismatch(
                "table section footer (v1)",
                stored_footer_checksum,
                computed_footer_checksum,
            ));
        }
    }

    let mut raw_offsets = Vec::with_capacity(number_of_entries);
    for i in 0..number_of_entries {
        raw_offsets.push(read_u32_le(entry_block, i * V1_ENTRY_SIZE)?);
    }

    let mut group = ChunkGroup::new(0, base_offset, first_chunk_number);
    let mut overflowed = false;
    for (i, &raw) in raw_offsets.iter().enumerate() {
        let compressed = raw & COMPRESSED_BIT != 0;
        let relative = (raw & OFFSET_MASK) as u64;
        let absolute_offset = base_offset + relative;

        if overflowed && compressed {
            return Err(Error::FormatInvariant(
                "table entry marked compressed after the table entered overflow mode".into(),
            ));
        }
        if absolute_offset > i32::MAX as u64 {
            overflowed = true;
        }

        let size = if i + 1 < raw_offsets.len() {
            let next_relative = (raw_offsets[i + 1] & OFFSET_MASK) as u64;
            let next_offset = base_offset + next_relative;
            next_offset.saturating_sub(absolute_offset) as u32
        } else {
            (section_end.saturating_sub(absolute_offset)) as u32
        };

        group
            .entries
            .push(ChunkDescriptor::new(segment, absolute_offset, size, compressed));
    }

    Ok(group)
}

/// Serializes `group`'s entries into a v1 table section payload (header +
/// entries + footer, per §4.5's generate algorithm). `target` gates
/// overflow-mode entry into the EnCase6+/Ewf2 acquisition targets.
pub fn write_table_v1(group: &ChunkGroup, target: AcquisitionTarget, footer: FooterPresence) -> Result<Vec<u8>> {
    check_entry_limit(group.number_of_entries(), target)?;

    let mut payload = vec![0u8; V1_HEADER_SIZE];
    write_u32_le(&mut payload, 0, group.number_of_entries() as u32);
    write_u64_le(&mut payload, 8, group.base_offset);

    let mut overflowed = false;
    let mut entry_bytes = Vec::with_capacity(group.number_of_entries() * V1_ENTRY_SIZE);
    for entry in &group.entries {
        let delta = entry.offset - group.base_offset;
        if delta > i32::MAX as u64 {
            if !target.permits_table_overflow() {
                return Err(Error::FormatInvariant(format!(
                    "table entry delta {:#x} exceeds INT32_MAX and {:?} does not permit overflow mode",
                    delta, target
                )));
            }
            overflowed = true;
        }
        if overflowed && entry.compressed {
            return Err(Error::FormatInvariant(
                "cannot mark a chunk compressed after the table entered overflow mode".into(),
            ));
        }

        let mut raw = (delta & OFFSET_MASK as u64) as u32;
        if entry.compressed {
            raw |= COMPRESSED_BIT;
        }
        entry_bytes.extend_from_slice(&raw.to_le_bytes());
    }

    let header_checksum = adler32(&payload[..20], 1);
    write_u32_le(&mut payload, 20, header_checksum);
    payload.extend_from_slice(&entry_bytes);

    if let FooterPresence::Present = footer {
        let footer_checksum = adler32(&entry_bytes, 1);
        payload.extend_from_slice(&footer_checksum.to_le_bytes());
    }

    Ok(payload)
}

/// Parses a v2 table section payload into a [`ChunkGroup`] (§4.5's v2 entry
/// layout: 64-bit offset, 32-bit size, 32-bit flags).
pub fn read_table_v2(payload: &[u8], segment: usize, target: AcquisitionTarget) -> Result<ChunkGroup> {
    if payload.len() < V2_HEADER_SIZE {
        return Err(Error::truncated("table section header (v2)", 0));
    }

    let first_chunk_number = read_u64_le(payload, 0)? as usize;
    let number_of_entries = read_u32_le(payload, 8)? as usize;
    let stored_header_checksum = read_u32_le(payload, 16)?;
    let computed_header_checksum = adler32(&payload[..16], 1);
    if stored_header_checksum != computed_header_checksum {
        return Err(Error::checksum_mismatch(
            "table section header (v2)",
            stored_header_checksum,
            computed_header_checksum,
        ));
    }

    check_entry_limit(number_of_entries, target)?;

    let entries_start = V2_HEADER_SIZE;
    let entries_bytes = number_of_entries * V2_ENTRY_SIZE;
    let entries_end = entries_start
        .checked_add(entries_bytes)
        .ok_or_else(|| Error::OutOfBounds("table entries region overflows usize".into()))?;
    if payload.len() < entries_end {
        return Err(Error::truncated("table section entries (v2)", entries_start as u64));
    }

    let mut group = ChunkGroup::new(0, 0, first_chunk_number);
    for i in 0..number_of_entries {
        let base = entries_start + i * V2_ENTRY_SIZE;
        let offset = read_u64_le(payload, base)?;
        let size = read_u32_le(payload, base + 8)?;
        let flags = read_u32_le(payload, base + 12)?;
        let compressed = flags & 0x1 != 0;
        group
            .entries
            .push(ChunkDescriptor::new(segment, offset, size, compressed));
    }

    Ok(group)
}

/// Serializes `group`'s entries into a v2 table section payload.
pub fn write_table_v2(group: &ChunkGroup) -> Vec<u8> {
    let mut payload = vec![0u8; V2_HEADER_SIZE];
    write_u64_le(&mut payload, 0, group.first_chunk_number as u64);
    write_u32_le(&mut payload, 8, group.number_of_entries() as u32);
    let header_checksum = adler32(&payload[..16], 1);
    write_u32_le(&mut payload, 16, header_checksum);

    for entry in &group.entries {
        let mut entry_bytes = [0u8; V2_ENTRY_SIZE];
        write_u64_le(&mut entry_bytes, 0, entry.offset);
        write_u32_le(&mut entry_bytes, 8, entry.size);
        let flags = if entry.compressed { 0x1 } else { 0x0 };
        write_u32_le(&mut entry_bytes, 12, flags);
        payload.extend_from_slice(&entry_bytes);
    }
    payload
}

fn check_entry_limit(number_of_entries: usize, target: AcquisitionTarget) -> Result<()> {
    let max = target.max_table_entries() as usize;
    if number_of_entries > max {
        return Err(Error::FormatInvariant(format!(
            "table declares {} entries, exceeding the {:?} limit of {}",
            number_of_entries, target, max
        )));
    }
    Ok(())
}
