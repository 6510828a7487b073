//! Section descriptor (v1 and v2) and the section dispatcher (§4.2, §4.3, §6.2).

pub mod delta_chunk;
pub mod error2;
pub mod hash;
pub mod header;
pub mod ltree;
pub mod session;
pub mod sectors;
pub mod table;
pub mod volume;

use crate::checksum::adler32;
use crate::endian::{read_bytes, read_u32_le, read_u64_le, write_bytes, write_u32_le, write_u64_le};
use crate::error::{Error, Result};
use crate::format::FormatVersion;
use crate::observer::Observer;

/// On-disk size of a section descriptor in both format versions (§4.2).
pub const DESCRIPTOR_SIZE: usize = 76;

/// The well-known section kinds named in §6.2, plus an escape hatch for
/// anything a strict reader does not recognize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionType {
    Done,
    Next,
    Header,
    Header2,
    XHeader,
    Volume,
    Disk,
    Sectors,
    Table,
    Table2,
    Ltree,
    Session,
    Error2,
    Hash,
    Md5Hash,
    Sha1Hash,
    Digest,
    DeltaChunk,
    /// Unrecognized v1 type string or v2 type code; carried so the
    /// dispatcher can skip it rather than reject the whole segment.
    Unknown(String),
}

impl SectionType {
    /// Maps a v1 NUL-padded ASCII type string to a [`SectionType`].
    pub fn from_v1_string(raw: &str) -> Self {
        match raw {
            "done" => SectionType::Done,
            "next" => SectionType::Next,
            "header" => SectionType::Header,
            "header2" => SectionType::Header2,
            "xheader" => SectionType::XHeader,
            "volume" => SectionType::Volume,
            "disk" => SectionType::Disk,
            "sectors" => SectionType::Sectors,
            "table" => SectionType::Table,
            "table2" => SectionType::Table2,
            "ltree" => SectionType::Ltree,
            "session" => SectionType::Session,
            "error2" => SectionType::Error2,
            "hash" => SectionType::Hash,
            "digest" => SectionType::Digest,
            "delta_chunk" => SectionType::DeltaChunk,
            other => SectionType::Unknown(other.to_string()),
        }
    }

    /// Renders the v1 ASCII type string for this section kind (used when
    /// writing a v1 descriptor).
    pub fn to_v1_string(&self) -> String {
        match self {
            SectionType::Done => "done",
            SectionType::Next => "next",
            SectionType::Header => "header",
            SectionType::Header2 => "header2",
            SectionType::XHeader => "xheader",
            SectionType::Volume => "volume",
            SectionType::Disk => "disk",
            SectionType::Sectors => "sectors",
            SectionType::Table => "table",
            SectionType::Table2 => "table2",
            SectionType::Ltree => "ltree",
            SectionType::Session => "session",
            SectionType::Error2 => "error2",
            SectionType::Hash => "hash",
            SectionType::Md5Hash => "md5_hash",
            SectionType::Sha1Hash => "sha1_hash",
            SectionType::Digest => "digest",
            SectionType::DeltaChunk => "delta_chunk",
            SectionType::Unknown(raw) => raw,
        }
        .to_string()
    }

    /// This crate's stable v2 numeric type-code assignment (§6.2 names the
    /// categories but not their wire values; format-version-2 images this
    /// crate itself writes use this table, and it reads back whatever an
    /// EWF2 producer wrote via the numeric code directly).
    pub fn to_v2_code(&self) -> u32 {
        match self {
            SectionType::Done => 0,
            SectionType::Next => 1,
            SectionType::XHeader => 2, // v2 "case-data"
            SectionType::Volume | SectionType::Disk => 3, // v2 "device-information"
            SectionType::Sectors => 4, // v2 "sector-data"
            SectionType::Table => 5,   // v2 "sector-table"
            SectionType::Ltree => 6,   // v2 "single-files-data"
            SectionType::Session => 7, // v2 "session-table"
            SectionType::Error2 => 8,  // v2 "error-table"
            SectionType::Md5Hash | SectionType::Hash => 9,
            SectionType::Sha1Hash => 10,
            SectionType::Digest => 11,
            SectionType::Header | SectionType::Header2 | SectionType::Table2 | SectionType::DeltaChunk => {
                u32::MAX // not representable in v2; never written
            }
            SectionType::Unknown(_) => u32::MAX,
        }
    }

    pub fn from_v2_code(code: u32) -> Self {
        match code {
            0 => SectionType::Done,
            1 => SectionType::Next,
            2 => SectionType::XHeader,
            3 => SectionType::Volume,
            4 => SectionType::Sectors,
            5 => SectionType::Table,
            6 => SectionType::Ltree,
            7 => SectionType::Session,
            8 => SectionType::Error2,
            9 => SectionType::Md5Hash,
            10 => SectionType::Sha1Hash,
            11 => SectionType::Digest,
            other => SectionType::Unknown(format!("code:{other}")),
        }
    }
}

/// Fixed-size per-section metadata block that precedes (v1) or follows
/// (v2) every section's payload (§3.1, §4.2).
#[derive(Debug, Clone)]
pub struct SectionDescriptor {
    pub format_version: FormatVersion,
    pub section_type: SectionType,
    pub start_offset: u64,
    pub end_offset: u64,
    pub size: u64,
    pub data_size: u64,
    pub padding_size: u32,
    pub data_flags: u32,
    /// v2 only: MD5 of the section's payload, zero if unset.
    pub data_integrity_hash: [u8; 16],
}

impl SectionDescriptor {
    /// Parses a v1 descriptor occupying `buf[0..76]`, located at
    /// `start_offset` in its segment file (§4.2's v1 read contract).
    pub fn read_v1(buf: &[u8], start_offset: u64, observer: &dyn Observer) -> Result<Self> {
        if buf.len() < DESCRIPTOR_SIZE {
            return Err(Error::truncated("section descriptor", start_offset));
        }

        let stored_checksum = read_u32_le(buf, 72)?;
        let computed_checksum = adler32(&buf[..72], 1);
        if stored_checksum != computed_checksum {
            return Err(Error::checksum_mismatch(
                "section descriptor (v1)",
                stored_checksum,
                computed_checksum,
            ));
        }

        let raw_type = read_bytes(buf, 0, 16)?;
        let type_string = String::from_utf8_lossy(raw_type)
            .trim_end_matches('\0')
            .to_string();
        let section_type = SectionType::from_v1_string(&type_string);

        let next_offset = read_u64_le(buf, 16)?;
        let declared_size = read_u64_le(buf, 24)?;

        let size = if declared_size == 0 {
            if next_offset == start_offset {
                // Self-loop: only valid for done/next, exactly one descriptor.
                if !matches!(section_type, SectionType::Done | SectionType::Next) {
                    return Err(Error::FormatInvariant(format!(
                        "section '{}' has size 0 and a self-referencing next_offset",
                        type_string
                    )));
                }
                DESCRIPTOR_SIZE as u64
            } else if next_offset > start_offset {
                let reconstructed = next_offset - start_offset;
                observer.section_size_reconstructed(&type_string, reconstructed);
                reconstructed
            } else {
                return Err(Error::FormatInvariant(format!(
                    "section '{}' has size 0 and next_offset {} <= start_offset {}",
                    type_string, next_offset, start_offset
                )));
            }
        } else {
            declared_size
        };

        let end_offset = start_offset
            .checked_add(size)
            .ok_or_else(|| Error::OutOfBounds("section end_offset overflows u64".into()))?;

        Ok(SectionDescriptor {
            format_version: FormatVersion::V1,
            section_type,
            start_offset,
            end_offset,
            size,
            data_size: size.saturating_sub(DESCRIPTOR_SIZE as u64),
            padding_size: 0,
            data_flags: 0,
            data_integrity_hash: [0u8; 16],
        })
    }

    /// Serializes this descriptor into v1's 76-byte layout (§4.2's v1 write
    /// contract): type string, next_offset, size, zero padding, checksum.
    pub fn write_v1(&self) -> [u8; DESCRIPTOR_SIZE] {
        let mut buf = [0u8; DESCRIPTOR_SIZE];
        let type_string = self.section_type.to_v1_string();
        let bytes = type_string.as_bytes();
        let copy_len = bytes.len().min(16);
        write_bytes(&mut buf, 0, &bytes[..copy_len]);
        write_u64_le(&mut buf, 16, self.end_offset);
        write_u64_le(&mut buf, 24, self.size);

        let checksum = adler32(&buf[..72], 1);
        write_u32_le(&mut buf, 72, checksum);
        buf
    }

    /// Parses a v2 descriptor occupying `buf[0..76]`. `file_offset` is the
    /// position in the segment file where the descriptor itself sits
    /// (trailing its own section's payload); `file_header_size` is the size
    /// of this segment's v2 file header, used only when this turns out to
    /// be the first section.
    ///
    /// The wire's `previous_offset` field does not name this section's own
    /// start — it names the file position of the *preceding* descriptor
    /// (0 for the very first section), per
    /// `original_source/libewf/libewf_section_descriptor.c`'s
    /// `libewf_section_descriptor_read_data` (format_version == 2 branch,
    /// ~line 683-714): `start_offset = previous_offset + 76` (the byte right
    /// after where the previous descriptor ends, i.e. exactly where this
    /// section's data begins), or `start_offset = file_header_size` when
    /// `previous_offset == 0`. Because the descriptor trails its own data,
    /// a segment can only be parsed by walking this chain *backward* from
    /// the file's last descriptor (see `handle.rs`'s `parse_one_segment_v2`).
    pub fn read_v2(buf: &[u8], file_offset: u64, file_header_size: u64) -> Result<Self> {
        if buf.len() < DESCRIPTOR_SIZE {
            return Err(Error::truncated("section descriptor", file_offset));
        }

        let stored_checksum = read_u32_le(buf, 72)?;
        let computed_checksum = adler32(&buf[..72], 1);
        if stored_checksum != computed_checksum {
            return Err(Error::checksum_mismatch(
                "section descriptor (v2)",
                stored_checksum,
                computed_checksum,
            ));
        }

        let type_code = read_u32_le(buf, 0)?;
        let data_flags = read_u32_le(buf, 4)?;
        let previous_offset = read_u64_le(buf, 8)?;
        let data_size = read_u64_le(buf, 16)?;
        let _descriptor_size = read_u32_le(buf, 24)?;
        let padding_size = read_u32_le(buf, 28)?;
        let data_integrity_hash = read_bytes(buf, 32, 16)?.try_into().unwrap();

        if previous_offset > file_offset {
            return Err(Error::FormatInvariant(format!(
                "section previous_offset {} exceeds this descriptor's own offset {}",
                previous_offset, file_offset
            )));
        }
        let start_offset = if previous_offset == 0 {
            file_header_size
        } else {
            if previous_offset < file_header_size {
                return Err(Error::FormatInvariant(format!(
                    "section previous_offset {} precedes the file header (size {})",
                    previous_offset, file_header_size
                )));
            }
            previous_offset
                .checked_add(DESCRIPTOR_SIZE as u64)
                .ok_or_else(|| Error::OutOfBounds("section start_offset overflows u64".into()))?
        };
        let end_offset = file_offset
            .checked_add(DESCRIPTOR_SIZE as u64)
            .ok_or_else(|| Error::OutOfBounds("section end_offset overflows u64".into()))?;
        let size = end_offset.saturating_sub(start_offset);

        if data_size > size {
            return Err(Error::FormatInvariant(format!(
                "data_size {} exceeds section size {}",
                data_size, size
            )));
        }
        if padding_size as u64 > data_size {
            return Err(Error::FormatInvariant(format!(
                "padding_size {} exceeds data_size {}",
                padding_size, data_size
            )));
        }

        Ok(SectionDescriptor {
            format_version: FormatVersion::V2,
            section_type: SectionType::from_v2_code(type_code),
            start_offset,
            end_offset,
            size,
            data_size,
            padding_size,
            data_flags,
            data_integrity_hash,
        })
    }

    /// File position of this descriptor's own 76 bytes (trails its data).
    pub fn descriptor_offset(&self) -> u64 {
        self.start_offset + self.data_size
    }

    /// File position of the *preceding* section's descriptor, or `None`
    /// when this is the first section in the segment (i.e.
    /// `start_offset == file_header_size`).
    pub fn previous_descriptor_offset(&self, file_header_size: u64) -> Option<u64> {
        if self.start_offset == file_header_size {
            None
        } else {
            Some(self.start_offset - DESCRIPTOR_SIZE as u64)
        }
    }

    /// Serializes this descriptor into v2's 76-byte layout, written after
    /// the section's own payload (§4.2's v2 write contract). `previous_offset`
    /// is 0 for the first section in a segment, or the file position of the
    /// previous section's own descriptor otherwise (see [`Self::read_v2`]).
    pub fn write_v2(&self, previous_offset: u64) -> [u8; DESCRIPTOR_SIZE] {
        let mut buf = [0u8; DESCRIPTOR_SIZE];
        write_u32_le(&mut buf, 0, self.section_type.to_v2_code());
        write_u32_le(&mut buf, 4, self.data_flags);
        write_u64_le(&mut buf, 8, previous_offset);
        write_u64_le(&mut buf, 16, self.data_size);
        write_u32_le(&mut buf, 24, DESCRIPTOR_SIZE as u32);
        write_u32_le(&mut buf, 28, self.padding_size);
        write_bytes(&mut buf, 32, &self.data_integrity_hash);

        let checksum = adler32(&buf[..72], 1);
        write_u32_le(&mut buf, 72, checksum);
        buf
    }

    /// Builds a descriptor for a section about to be written, mirroring
    /// `libewf_section_descriptor_set` (§2 "Supplemented features").
    pub fn new_for_write(
        format_version: FormatVersion,
        section_type: SectionType,
        start_offset: u64,
        size: u64,
        data_size: u64,
        padding_size: u32,
    ) -> Self {
        SectionDescriptor {
            format_version,
            section_type,
            start_offset,
            end_offset: start_offset + size,
            size,
            data_size,
            padding_size,
            data_flags: 0,
            data_integrity_hash: [0u8; 16],
        }
    }

    pub fn data_offset(&self) -> u64 {
        match self.format_version {
            FormatVersion::V1 => self.start_offset + DESCRIPTOR_SIZE as u64,
            FormatVersion::V2 => self.start_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;

    /// §8.2 scenario 1: the 76 bytes of `ewf_test_section_descriptor_data1`.
    fn done_section_bytes(next_offset: u64) -> [u8; DESCRIPTOR_SIZE] {
        let mut buf = [0u8; DESCRIPTOR_SIZE];
        buf[0..4].copy_from_slice(b"done");
        write_u64_le(&mut buf, 16, next_offset);
        // size left at 0
        let checksum = adler32(&buf[..72], 1);
        write_u32_le(&mut buf, 72, checksum);
        buf
    }

    #[test]
    fn v1_done_section_with_self_referencing_offset() {
        let start_offset = 0x0001_21a1u64;
        let buf = done_section_bytes(start_offset);

        let descriptor = SectionDescriptor::read_v1(&buf, start_offset, &NullObserver).unwrap();
        assert_eq!(descriptor.section_type, SectionType::Done);
        assert_eq!(descriptor.size, DESCRIPTOR_SIZE as u64);
        assert_eq!(descriptor.end_offset, start_offset + DESCRIPTOR_SIZE as u64);
    }

    #[test]
    fn v1_checksum_mismatch_is_rejected() {
        let start_offset = 0x0001_21a1u64;
        let mut buf = done_section_bytes(start_offset);
        buf[72..76].copy_from_slice(&0xFFFFFFFFu32.to_le_bytes());

        let result = SectionDescriptor::read_v1(&buf, start_offset, &NullObserver);
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn v1_size_zero_reconstructed_from_next_offset() {
        let start_offset = 0x1000u64;
        let next_offset = 0x1200u64;
        let mut buf = [0u8; DESCRIPTOR_SIZE];
        buf[0..6].copy_from_slice(b"header");
        write_u64_le(&mut buf, 16, next_offset);
        let checksum = adler32(&buf[..72], 1);
        write_u32_le(&mut buf, 72, checksum);

        let descriptor = SectionDescriptor::read_v1(&buf, start_offset, &NullObserver).unwrap();
        assert_eq!(descriptor.size, next_offset - start_offset);
    }

    #[test]
    fn v1_round_trip_through_write_then_read() {
        let descriptor = SectionDescriptor::new_for_write(
            FormatVersion::V1,
            SectionType::Table,
            0x2000,
            0x500,
            0x500 - DESCRIPTOR_SIZE as u64,
            0,
        );
        let bytes = descriptor.write_v1();
        let parsed = SectionDescriptor::read_v1(&bytes, 0x2000, &NullObserver).unwrap();

        assert_eq!(parsed.section_type, descriptor.section_type);
        assert_eq!(parsed.size, descriptor.size);
        assert_eq!(parsed.end_offset, descriptor.end_offset);
    }

    #[test]
    fn v2_round_trip_through_write_then_read() {
        // First section in the segment: previous_offset == 0, so start_offset
        // falls back to file_header_size, which here is chosen to equal
        // the descriptor's own start_offset.
        let file_header_size = 0x100u64;
        let mut descriptor = SectionDescriptor::new_for_write(
            FormatVersion::V2,
            SectionType::Volume,
            file_header_size,
            0x450,
            0x450 - DESCRIPTOR_SIZE as u64,
            0,
        );
        descriptor.data_integrity_hash = [0xab; 16];

        let file_offset = descriptor.start_offset + descriptor.data_size;
        let bytes = descriptor.write_v2(0x0);
        let parsed = SectionDescriptor::read_v2(&bytes, file_offset, file_header_size).unwrap();

        assert_eq!(parsed.section_type, SectionType::Volume);
        assert_eq!(parsed.data_size, descriptor.data_size);
        assert_eq!(parsed.data_integrity_hash, descriptor.data_integrity_hash);
        assert_eq!(parsed.start_offset, file_header_size);
        assert_eq!(parsed.previous_descriptor_offset(file_header_size), None);
    }

    #[test]
    fn v2_chains_to_the_preceding_descriptor_offset() {
        // Second section: its descriptor's previous_offset names the file
        // position of the first section's own descriptor, not that
        // section's start_offset.
        let file_header_size = 0x20u64;
        let first_descriptor_offset = 0x120u64; // where section 1's descriptor sits
        let second_start = first_descriptor_offset + DESCRIPTOR_SIZE as u64;
        let second_data_size = 0x40u64;
        let descriptor = SectionDescriptor::new_for_write(
            FormatVersion::V2,
            SectionType::Table,
            second_start,
            second_data_size + DESCRIPTOR_SIZE as u64,
            second_data_size,
            0,
        );
        let file_offset = second_start + second_data_size;
        let bytes = descriptor.write_v2(first_descriptor_offset);
        let parsed = SectionDescriptor::read_v2(&bytes, file_offset, file_header_size).unwrap();

        assert_eq!(parsed.start_offset, second_start);
        assert_eq!(
            parsed.previous_descriptor_offset(file_header_size),
            Some(first_descriptor_offset)
        );
    }

    #[test]
    fn v2_rejects_data_size_larger_than_section_size() {
        let file_header_size = 0x100u64;
        let mut descriptor = SectionDescriptor::new_for_write(
            FormatVersion::V2,
            SectionType::Volume,
            file_header_size,
            0x10,
            0x10,
            0,
        );
        descriptor.data_size = 0x1000; // corrupt on purpose
        let file_offset = descriptor.start_offset + 0x10 - DESCRIPTOR_SIZE as u64;
        let bytes = descriptor.write_v2(0);

        let result = SectionDescriptor::read_v2(&bytes, file_offset, file_header_size);
        assert!(matches!(result, Err(Error::FormatInvariant(_))));
    }
}
