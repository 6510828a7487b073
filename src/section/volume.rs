//! Volume section: S01, E01, and the L01 zero-chunk indicator (§4.4).

use crate::checksum::adler32;
use crate::endian::{read_bytes, read_u32_le, write_bytes, write_u32_le};
use crate::error::{Error, Result};
use crate::format::{Config, MediaFlags, MediaType};
use crate::media_values::MediaValues;
use crate::observer::Observer;

/// `unknown1[4] + number_of_chunks[4] + sectors_per_chunk[4] +
/// bytes_per_sector[4] + number_of_sectors[4] + unknown2[20] +
/// unknown3[45] + signature[5] + checksum[4]` (§4.4), matching
/// `original_source/libewf/ewf_volume_smart.t`'s real struct sum.
pub const S01_PAYLOAD_SIZE: usize = 94;
pub const E01_PAYLOAD_SIZE: usize = 1052;

/// Which on-disk shape the volume payload had, derived from its size and
/// (for S01) its signature (§8.1 "Volume classification" property).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeShape {
    /// `signature == "SMART"`.
    Smart,
    /// S01-sized payload without the SMART signature.
    Ewf,
    /// E01-sized payload, `number_of_chunks != 0`.
    E01,
    /// E01-sized payload, `number_of_chunks == 0` (L01 indicator).
    L01,
}

/// Parses whichever volume payload shape matches `payload.len()`.
pub fn read_volume_section(payload: &[u8], config: &Config, observer: &dyn Observer) -> Result<(VolumeShape, MediaValues)> {
    match payload.len() {
        S01_PAYLOAD_SIZE => read_s01(payload, config, observer),
        E01_PAYLOAD_SIZE => read_e01(payload, config, observer),
        other => Err(Error::FormatInvariant(format!(
            "volume section payload size {} matches neither S01 ({}) nor E01 ({})",
            other, S01_PAYLOAD_SIZE, E01_PAYLOAD_SIZE
        ))),
    }
}

fn read_s01(payload: &[u8], config: &Config, observer: &dyn Observer) -> Result<(VolumeShape, MediaValues)> {
    let stored_checksum = read_u32_le(payload, 90)?;
    let computed_checksum = adler32(&payload[..90], 1);
    if stored_checksum != computed_checksum {
        return Err(Error::checksum_mismatch("volume section (S01)", stored_checksum, computed_checksum));
    }

    let number_of_chunks = read_u32_le(payload, 4)?;
    let sectors_per_chunk = read_u32_le(payload, 8)?;
    let bytes_per_sector = read_u32_le(payload, 12)?;
    let number_of_sectors = read_u32_le(payload, 16)? as u64;
    let signature = read_bytes(payload, 85, 5)?;

    let shape = if signature == b"SMART" {
        VolumeShape::Smart
    } else {
        VolumeShape::Ewf
    };

    let chunk_size = MediaValues::resolve_chunk_size(sectors_per_chunk, bytes_per_sector, config, observer)?;
    let media = MediaValues {
        media_type: MediaType::Fixed,
        media_flags: MediaFlags::default(),
        chunk_size,
        sectors_per_chunk,
        bytes_per_sector,
        number_of_chunks,
        number_of_sectors,
        error_granularity: 0,
        compression_level: 0,
        set_identifier: [0u8; 16],
    };
    Ok((shape, media))
}

/// Writes the 94-byte S01 payload (checksum included), per §4.4's layout.
pub fn write_s01(media: &MediaValues) -> [u8; S01_PAYLOAD_SIZE] {
    let mut buf = [0u8; S01_PAYLOAD_SIZE];
    write_u32_le(&mut buf, 4, media.number_of_chunks);
    write_u32_le(&mut buf, 8, media.sectors_per_chunk);
    write_u32_le(&mut buf, 12, media.bytes_per_sector);
    write_u32_le(&mut buf, 16, media.number_of_sectors as u32);
    write_bytes(&mut buf, 85, b"SMART");
    let checksum = adler32(&buf[..90], 1);
    write_u32_le(&mut buf, 90, checksum);
    buf
}

fn read_e01(payload: &[u8], config: &Config, observer: &dyn Observer) -> Result<(VolumeShape, MediaValues)> {
    let stored_checksum = read_u32_le(payload, 1048)?;
    let computed_checksum = adler32(&payload[..1048], 1);
    if stored_checksum != computed_checksum {
        return Err(Error::checksum_mismatch("volume section (E01)", stored_checksum, computed_checksum));
    }

    let media_type_byte = payload[0];
    let number_of_chunks = read_u32_le(payload, 4)?;
    let sectors_per_chunk = read_u32_le(payload, 8)?;
    let bytes_per_sector = read_u32_le(payload, 12)?;
    let number_of_sectors = {
        let bytes = read_bytes(payload, 16, 8)?;
        u64::from_le_bytes(bytes.try_into().unwrap())
    };
    let media_flags_byte = payload[24];
    let compression_level = payload[44];
    let error_granularity = read_u32_le(payload, 48)?;
    let set_identifier: [u8; 16] = read_bytes(payload, 56, 16)?.try_into().unwrap();

    let chunk_size = MediaValues::resolve_chunk_size(sectors_per_chunk, bytes_per_sector, config, observer)?;
    let media = MediaValues {
        media_type: MediaType::from_byte(media_type_byte),
        media_flags: MediaFlags(media_flags_byte),
        chunk_size,
        sectors_per_chunk,
        bytes_per_sector,
        number_of_chunks,
        number_of_sectors,
        error_granularity,
        compression_level,
        set_identifier,
    };

    let shape = if number_of_chunks == 0 {
        VolumeShape::L01
    } else {
        VolumeShape::E01
    };
    Ok((shape, media))
}

/// Writes the 1052-byte E01 payload (checksum included), per §4.4's layout.
pub fn write_e01(media: &MediaValues) -> Vec<u8> {
    let mut buf = vec![0u8; E01_PAYLOAD_SIZE];
    buf[0] = media.media_type.to_byte();
    write_u32_le(&mut buf, 4, media.number_of_chunks);
    write_u32_le(&mut buf, 8, media.sectors_per_chunk);
    write_u32_le(&mut buf, 12, media.bytes_per_sector);
    buf[16..24].copy_from_slice(&media.number_of_sectors.to_le_bytes());
    buf[24] = media.media_flags.0;
    buf[44] = media.compression_level;
    write_u32_le(&mut buf, 48, media.error_granularity);
    write_bytes(&mut buf, 56, &media.set_identifier);
    write_bytes(&mut buf, 1043, b"\0\0\0\0\0"); // unused signature slot, kept zeroed
    let checksum = adler32(&buf[..1048], 1);
    write_u32_le(&mut buf, 1048, checksum);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Config;
    use crate::observer::NullObserver;

    #[test]
    fn smart_signature_classifies_as_smart() {
        let media = MediaValues::new(64, 512, 100, 6400).unwrap();
        let payload = write_s01(&media);

        let (shape, parsed) = read_volume_section(&payload, &Config::default(), &NullObserver).unwrap();
        assert_eq!(shape, VolumeShape::Smart);
        assert_eq!(parsed.number_of_chunks, 100);
        assert_eq!(parsed.chunk_size, 64 * 512);
    }

    #[test]
    fn s01_checksum_mismatch_is_rejected() {
        let media = MediaValues::new(64, 512, 100, 6400).unwrap();
        let mut payload = write_s01(&media);
        payload[90..94].copy_from_slice(&0xFFFFFFFFu32.to_le_bytes());

        let result = read_volume_section(&payload, &Config::default(), &NullObserver);
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn e01_zero_chunks_classifies_as_l01() {
        let mut media = MediaValues::new(64, 512, 0, 0).unwrap();
        media.media_type = MediaType::LogicalEvidenceFile;
        let payload = write_e01(&media);

        let (shape, parsed) = read_volume_section(&payload, &Config::default(), &NullObserver).unwrap();
        assert_eq!(shape, VolumeShape::L01);
        assert_eq!(parsed.media_type, MediaType::LogicalEvidenceFile);
    }

    #[test]
    fn e01_nonzero_chunks_classifies_as_e01() {
        let media = MediaValues::new(64, 512, 10, 640).unwrap();
        let payload = write_e01(&media);

        let (shape, _parsed) = read_volume_section(&payload, &Config::default(), &NullObserver).unwrap();
        assert_eq!(shape, VolumeShape::E01);
    }

    #[test]
    fn e01_round_trips_media_flags_and_geometry() {
        let mut media = MediaValues::new(32, 4096, 50, 1600).unwrap();
        media.media_flags = MediaFlags(MediaFlags::IS_PHYSICAL);
        media.compression_level = 2;
        media.error_granularity = 64;
        media.set_identifier = [0x42; 16];

        let payload = write_e01(&media);
        let (_shape, parsed) = read_volume_section(&payload, &Config::default(), &NullObserver).unwrap();

        assert_eq!(parsed.media_flags, media.media_flags);
        assert_eq!(parsed.compression_level, media.compression_level);
        assert_eq!(parsed.error_granularity, media.error_granularity);
        assert_eq!(parsed.set_identifier, media.set_identifier);
    }
}
