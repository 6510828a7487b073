//! Session / track section (§4.9).
//!
//! Same structural shape as [`super::error2`] but the entries describe
//! transitions rather than standalone ranges: each entry's `start_sector`
//! closes the previous open range and opens the next one. The first entry
//! anchors range 0; the final range is closed at a caller-supplied sector
//! count (typically `MediaValues::number_of_sectors`).
//!
//! v1 entries carry no flag field, so a v1 session section cannot
//! distinguish session boundaries from track boundaries or mark a track
//! as audio; every v1 entry is read as both a session and a track
//! boundary. v2 entries carry a 32-bit flags field; bit 0 marks an audio
//! track, bit 1 marks a session boundary (this crate's own convention,
//! since the byte value of that bit is not otherwise specified).

use crate::checksum::adler32;
use crate::endian::{read_u32_le, read_u64_le, write_u32_le, write_u64_le};
use crate::error::{Error, Result};
use crate::sector_range::SectorRangeList;

const V1_HEADER_SIZE: usize = 208;
const V1_ENTRY_SIZE: usize = 32;
const V1_FOOTER_SIZE: usize = 4;

const V2_HEADER_SIZE: usize = 32;
const V2_ENTRY_SIZE: usize = 32;
const V2_FOOTER_SIZE: usize = 16;

const FLAG_AUDIO: u32 = 0x1;
const FLAG_SESSION_BOUNDARY: u32 = 0x2;

struct Entry {
    start_sector: u64,
    is_session_boundary: bool,
}

/// Sessions and tracks reconstructed from a session section's entries
/// (§4.9's reconstruction algorithm).
pub struct SessionSections {
    pub sessions: SectorRangeList,
    pub tracks: SectorRangeList,
}

fn reconstruct(entries: &[Entry], total_number_of_sectors: u64) -> Result<SessionSections> {
    let mut sessions = SectorRangeList::new();
    let mut tracks = SectorRangeList::new();

    if entries.is_empty() {
        return Ok(SessionSections { sessions, tracks });
    }

    let mut pending_track_start = entries[0].start_sector;
    let mut pending_session_start = entries[0].start_sector;

    for entry in &entries[1..] {
        tracks.append(pending_track_start, entry.start_sector - pending_track_start)?;
        pending_track_start = entry.start_sector;

        if entry.is_session_boundary {
            sessions.append(pending_session_start, entry.start_sector - pending_session_start)?;
            pending_session_start = entry.start_sector;
        }
    }

    tracks.append(pending_track_start, total_number_of_sectors.saturating_sub(pending_track_start))?;
    sessions.append(pending_session_start, total_number_of_sectors.saturating_sub(pending_session_start))?;

    Ok(SessionSections { sessions, tracks })
}

/// Parses a v1 session section payload.
pub fn read_session_v1(payload: &[u8], total_number_of_sectors: u64) -> Result<SessionSections> {
    if payload.len() < V1_HEADER_SIZE {
        return Err(Error::truncated("session header (v1)", 0));
    }
    let number_of_entries = read_u32_le(payload, 0)? as usize;
    let stored_header_checksum = read_u32_le(payload, V1_HEADER_SIZE - 4)?;
    let computed_header_checksum = adler32(&payload[..V1_HEADER_SIZE - 4], 1);
    if stored_header_checksum != computed_header_checksum {
        return Err(Error::checksum_mismatch("session header (v1)", stored_header_checksum, computed_header_checksum));
    }

    let entries_start = V1_HEADER_SIZE;
    let entries_bytes = number_of_entries * V1_ENTRY_SIZE;
    let entries_end = entries_start + entries_bytes;
    if payload.len() < entries_end + V1_FOOTER_SIZE {
        return Err(Error::truncated("session entries (v1)", entries_start as u64));
    }
    let entry_block = &payload[entries_start..entries_end];

    let stored_footer_checksum = read_u32_le(payload, entries_end)?;
    let computed_footer_checksum = adler32(entry_block, 1);
    if stored_footer_checksum != computed_footer_checksum {
        return Err(Error::checksum_mismatch("session footer (v1)", stored_footer_checksum, computed_footer_checksum));
    }

    let mut entries = Vec::with_capacity(number_of_entries);
    for i in 0..number_of_entries {
        let base = i * V1_ENTRY_SIZE;
        let start_sector = read_u32_le(entry_block, base + 4)? as u64;
        entries.push(Entry {
            start_sector,
            is_session_boundary: true,
        });
    }

    reconstruct(&entries, total_number_of_sectors)
}

/// Serializes `sessions` into a v1 session section payload. v1 has no
/// track/audio flag, so only session boundaries are representable; `tracks`
/// finer than session granularity is lossy across a v1 round trip.
pub fn write_session_v1(sessions: &SectorRangeList) -> Vec<u8> {
    let mut payload = vec![0u8; V1_HEADER_SIZE];
    write_u32_le(&mut payload, 0, sessions.len() as u32);
    let header_checksum = adler32(&payload[..V1_HEADER_SIZE - 4], 1);
    write_u32_le(&mut payload, V1_HEADER_SIZE - 4, header_checksum);

    let mut entry_block = Vec::with_capacity(sessions.len() * V1_ENTRY_SIZE);
    for range in sessions.iter() {
        let mut entry = [0u8; V1_ENTRY_SIZE];
        write_u32_le(&mut entry, 4, range.start_sector() as u32);
        entry_block.extend_from_slice(&entry);
    }
    let footer_checksum = adler32(&entry_block, 1);
    payload.extend_from_slice(&entry_block);
    payload.extend_from_slice(&footer_checksum.to_le_bytes());
    payload
}

/// Parses a v2 session section payload.
pub fn read_session_v2(payload: &[u8], total_number_of_sectors: u64) -> Result<SessionSections> {
    if payload.len() < V2_HEADER_SIZE {
        return Err(Error::truncated("session header (v2)", 0));
    }
    let number_of_entries = read_u32_le(payload, 0)? as usize;
    let stored_header_checksum = read_u32_le(payload, 16)?;
    let computed_header_checksum = adler32(&payload[..16], 1);
    if stored_header_checksum != computed_header_checksum {
        return Err(Error::checksum_mismatch("session header (v2)", stored_header_checksum, computed_header_checksum));
    }

    let entries_start = V2_HEADER_SIZE;
    let entries_bytes = number_of_entries * V2_ENTRY_SIZE;
    let entries_end = entries_start + entries_bytes;
    if payload.len() < entries_end + V2_FOOTER_SIZE {
        return Err(Error::truncated("session entries (v2)", entries_start as u64));
    }
    let entry_block = &payload[entries_start..entries_end];

    let stored_footer_checksum = read_u32_le(payload, entries_end)?;
    let computed_footer_checksum = adler32(entry_block, 1);
    if stored_footer_checksum != computed_footer_checksum {
        return Err(Error::checksum_mismatch("session footer (v2)", stored_footer_checksum, computed_footer_checksum));
    }

    let mut entries = Vec::with_capacity(number_of_entries);
    for i in 0..number_of_entries {
        let base = i * V2_ENTRY_SIZE;
        let start_sector = read_u64_le(entry_block, base)?;
        let flags = read_u32_le(entry_block, base + 8)?;
        entries.push(Entry {
            start_sector,
            is_session_boundary: flags & FLAG_SESSION_BOUNDARY != 0,
        });
    }

    reconstruct(&entries, total_number_of_sectors)
}

/// Serializes `sessions` and `tracks` into a v2 session section payload,
/// walking both lists in parallel and emitting one entry per transition
/// (§4.9's write contract).
pub fn write_session_v2(sessions: &SectorRangeList, tracks: &SectorRangeList, audio_tracks: &[bool]) -> Result<Vec<u8>> {
    let mut boundaries: Vec<(u64, u32)> = Vec::new();
    let session_starts: std::collections::HashSet<u64> =
        sessions.iter().map(|r| r.start_sector()).collect();

    for (index, range) in tracks.iter().enumerate() {
        let mut flags = 0u32;
        if audio_tracks.get(index).copied().unwrap_or(false) {
            flags |= FLAG_AUDIO;
        }
        if session_starts.contains(&range.start_sector()) {
            flags |= FLAG_SESSION_BOUNDARY;
        }
        boundaries.push((range.start_sector(), flags));
    }

    let mut payload = vec![0u8; V2_HEADER_SIZE];
    write_u32_le(&mut payload, 0, boundaries.len() as u32);
    let header_checksum = adler32(&payload[..16], 1);
    write_u32_le(&mut payload, 16, header_checksum);

    let mut entry_block = Vec::with_capacity(boundaries.len() * V2_ENTRY_SIZE);
    for (start_sector, flags) in &boundaries {
        let mut entry = [0u8; V2_ENTRY_SIZE];
        write_u64_le(&mut entry, 0, *start_sector);
        write_u32_le(&mut entry, 8, *flags);
        entry_block.extend_from_slice(&entry);
    }
    let footer_checksum = adler32(&entry_block, 1);
    payload.extend_from_slice(&entry_block);
    payload.extend_from_slice(&footer_checksum.to_le_bytes());
    payload.extend_from_slice(&[0u8; 12]);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_reconstructs_session_at_sector_zero() {
        let mut payload = vec![0u8; V1_HEADER_SIZE];
        write_u32_le(&mut payload, 0, 2);
        let header_checksum = adler32(&payload[..V1_HEADER_SIZE - 4], 1);
        write_u32_le(&mut payload, V1_HEADER_SIZE - 4, header_checksum);

        let mut entry_block = vec![0u8; V1_ENTRY_SIZE * 2];
        write_u32_le(&mut entry_block, 4, 0);
        write_u32_le(&mut entry_block, V1_ENTRY_SIZE + 4, 1000);
        let footer_checksum = adler32(&entry_block, 1);
        payload.extend_from_slice(&entry_block);
        payload.extend_from_slice(&footer_checksum.to_le_bytes());

        let result = read_session_v1(&payload, 2000).unwrap();
        assert_eq!(result.sessions.len(), 2);
        assert_eq!(result.sessions.get_range(0).unwrap().start_sector(), 0);
        assert_eq!(result.sessions.get_range(0).unwrap().end_sector(), 1000);
        assert_eq!(result.sessions.get_range(1).unwrap().end_sector(), 2000);
    }

    #[test]
    fn v1_tolerates_encase_sector_16_start() {
        let mut payload = vec![0u8; V1_HEADER_SIZE];
        write_u32_le(&mut payload, 0, 1);
        let header_checksum = adler32(&payload[..V1_HEADER_SIZE - 4], 1);
        write_u32_le(&mut payload, V1_HEADER_SIZE - 4, header_checksum);

        let mut entry_block = vec![0u8; V1_ENTRY_SIZE];
        write_u32_le(&mut entry_block, 4, 16);
        let footer_checksum = adler32(&entry_block, 1);
        payload.extend_from_slice(&entry_block);
        payload.extend_from_slice(&footer_checksum.to_le_bytes());

        let result = read_session_v1(&payload, 5000).unwrap();
        assert_eq!(result.sessions.get_range(0).unwrap().start_sector(), 16);
    }

    #[test]
    fn v2_distinguishes_tracks_within_one_session() {
        let mut sessions = SectorRangeList::new();
        sessions.append(0, 2000).unwrap();
        let mut tracks = SectorRangeList::new();
        tracks.append(0, 800).unwrap();
        tracks.append(800, 1200).unwrap();

        let payload = write_session_v2(&sessions, &tracks, &[false, true]).unwrap();
        let result = read_session_v2(&payload, 2000).unwrap();

        assert_eq!(result.sessions.len(), 1);
        assert_eq!(result.tracks.len(), 2);
        assert_eq!(result.tracks.get_range(1).unwrap().start_sector(), 800);
    }
}
