//! Format discriminators and tunables (§4.4, §6.1, §6.3).

use serde::{Deserialize, Serialize};

/// Section descriptor / container layout generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatVersion {
    /// v1: 76-byte descriptor precedes its payload; ASCII type string.
    V1,
    /// v2: descriptor follows its payload; numeric type code.
    V2,
}

/// Concrete on-disk container flavor, derived from the volume section's
/// payload size and signature (§8.1 "Volume classification" property).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    /// EWF-S01 written by the original "SMART" tool (`signature == "SMART"`).
    Smart,
    /// EWF-E01, any EnCase generation (EnCase1..7, Linen5..7, FTK, EWFX).
    Encase,
    /// EWF-L01 / EWF2-Lx01: logical-files image, zero-chunk E01-shaped
    /// volume section plus an `ltree`/single-files-data section.
    Logical,
    /// EWF2 Ex01/Lx01: format-version-2 container.
    Ewf2,
}

/// Acquisition target, bounding chunk-count and table-size limits (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionTarget {
    EnCaseLegacy,
    EnCase6Plus,
    Smart,
    Ewf2,
}

impl AcquisitionTarget {
    /// Maximum number of entries permitted in a single table section.
    pub fn max_table_entries(self) -> u32 {
        match self {
            AcquisitionTarget::EnCaseLegacy => 16384,
            AcquisitionTarget::EnCase6Plus => 65534,
            AcquisitionTarget::Smart => 16384,
            AcquisitionTarget::Ewf2 => 65534,
        }
    }

    /// Whether a table may switch into overflow mode (offsets past
    /// `INT32_MAX`, no longer permitted to mark a chunk compressed).
    pub fn permits_table_overflow(self) -> bool {
        matches!(self, AcquisitionTarget::EnCase6Plus | AcquisitionTarget::Ewf2)
    }
}

/// Deflate compression level recognized as a tunable (§6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionLevel {
    None,
    EmptyBlock,
    Fast,
    Best,
}

/// Media type as stored in the E01 volume payload (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Removable,
    Fixed,
    Optical,
    LogicalEvidenceFile,
    Memory,
    Unknown(u8),
}

impl MediaType {
    pub fn from_byte(value: u8) -> Self {
        match value {
            0x00 => MediaType::Removable,
            0x01 => MediaType::Fixed,
            0x03 => MediaType::Optical,
            0x0e => MediaType::LogicalEvidenceFile,
            0x10 => MediaType::Memory,
            other => MediaType::Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            MediaType::Removable => 0x00,
            MediaType::Fixed => 0x01,
            MediaType::Optical => 0x03,
            MediaType::LogicalEvidenceFile => 0x0e,
            MediaType::Memory => 0x10,
            MediaType::Unknown(value) => value,
        }
    }
}

/// Media flag bits (E01 volume section, bit 0 = "is physical device").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaFlags(pub u8);

impl MediaFlags {
    pub const IS_PHYSICAL: u8 = 0x01;
    pub const IS_FASTBLOC_TAINTED: u8 = 0x02;
    pub const USES_LOGICAL_EVIDENCE_FILE: u8 = 0x04;

    pub fn is_physical(self) -> bool {
        self.0 & Self::IS_PHYSICAL != 0
    }
}

/// Caller-tunable acquisition/container parameters (§6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub compression_level: CompressionLevel,
    pub target: AcquisitionTarget,
    /// Cap on a single segment file's size; 2 GiB for 32-bit-offset formats.
    pub segment_file_size: u64,
    pub sectors_per_chunk: u32,
    pub bytes_per_sector: u32,
    pub error_granularity: u32,
    pub media_type: MediaType,
    pub media_flags: MediaFlags,
    /// Open Question 1: whether to enforce the SMART table footer checksum
    /// even though historic SMART producers never wrote one reliably.
    pub strict_smart_table_checksum: bool,
    /// Open Question 3: clamp-and-warn vs. reject-by-default for
    /// out-of-bounds `number_of_entries` in a table section.
    pub lenient_table_limits: bool,
    /// Whether chunk geometry whose `sectors_per_chunk * bytes_per_sector`
    /// exceeds INT32_MAX falls back to `media_values::MINIMUM_CHUNK_SIZE`
    /// (with a warning) instead of being rejected outright.
    pub lenient_chunk_size_limits: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            compression_level: CompressionLevel::Fast,
            target: AcquisitionTarget::EnCase6Plus,
            segment_file_size: 2 * 1024 * 1024 * 1024 - 1,
            sectors_per_chunk: 64,
            bytes_per_sector: 512,
            error_granularity: 64,
            media_type: MediaType::Fixed,
            media_flags: MediaFlags(MediaFlags::IS_PHYSICAL),
            strict_smart_table_checksum: false,
            lenient_table_limits: false,
            lenient_chunk_size_limits: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_round_trips_through_byte() {
        for mt in [
            MediaType::Removable,
            MediaType::Fixed,
            MediaType::Optical,
            MediaType::LogicalEvidenceFile,
            MediaType::Memory,
        ] {
            assert_eq!(MediaType::from_byte(mt.to_byte()), mt);
        }
    }

    #[test]
    fn acquisition_target_limits() {
        assert_eq!(AcquisitionTarget::EnCaseLegacy.max_table_entries(), 16384);
        assert_eq!(AcquisitionTarget::EnCase6Plus.max_table_entries(), 65534);
        assert!(AcquisitionTarget::EnCase6Plus.permits_table_overflow());
        assert!(!AcquisitionTarget::EnCaseLegacy.permits_table_overflow());
    }
}
