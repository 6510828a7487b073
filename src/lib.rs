//! Reader/writer for the Expert Witness Compression Format family
//! (EWF/E01, S01/SMART, L01, Ex01, Lx01): a segmented, chunked,
//! checksummed disk-image container used in digital forensics.
//!
//! The entry point is [`EwfHandle`], which opens a multi-segment image
//! (`open_existing`) or starts a fresh one for writing (`new_for_write`)
//! and exposes `Read`/`Seek` over the reconstructed flat byte stream.
//! Everything below `EwfHandle` — the section grammar, the chunk offset
//! table, checksums, codecs — is organized the way the format itself is
//! organized: one module per section kind, plus shared primitives
//! (endian decoding, Adler-32, the compression codec) at the top level.

pub mod checksum;
pub mod chunk;
pub mod codec;
pub mod endian;
pub mod error;
pub mod format;
pub mod handle;
pub mod hash_sections;
pub mod media_values;
pub mod observer;
pub mod sector_range;
pub mod section;
pub mod segment_pool;

pub use chunk::{ChunkDescriptor, ChunkGroup, OffsetTable};
pub use codec::{Codec, ZlibCodec};
pub use error::{Error, Result};
pub use format::{AcquisitionTarget, CompressionLevel, Config, FormatVersion, ImageFormat, MediaFlags, MediaType};
pub use handle::{default_observer, EwfHandle};
pub use hash_sections::HashSections;
pub use media_values::MediaValues;
pub use observer::{LogObserver, NullObserver, Observer};
pub use sector_range::{SectorRange, SectorRangeList};
pub use segment_pool::{FileSegmentPool, SegmentFilePool};
