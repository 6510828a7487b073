//! Error taxonomy for the EWF container engine.
//!
//! The kinds mirror the propagation policy described for the format: a
//! per-chunk checksum mismatch is local (the caller taints the chunk and
//! keeps going) while every other kind surfaces to the caller untouched.

use std::io;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Every way a read, write, or parse of an EWF container can fail.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An Adler-32 (section header/footer/table) checksum did not match.
    #[error("checksum mismatch in {context}: expected {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch {
        context: &'static str,
        expected: u32,
        actual: u32,
    },

    /// A layout invariant was violated (e.g. `data_size > size`, an
    /// overflow-mode table with a compressed entry, out-of-order table
    /// entries).
    #[error("format invariant violated: {0}")]
    FormatInvariant(String),

    /// The format version is neither 1 nor 2, or a section code/type string
    /// is not recognized by a strict reader.
    #[error("unsupported format version or section type: {0}")]
    UnsupportedVersion(String),

    /// A segment file ended before the declared end of the current section.
    #[error("segment truncated while reading {context} at offset {offset:#x}")]
    Truncated { context: &'static str, offset: u64 },

    /// An argument passed at the API surface is out of bounds.
    #[error("argument out of bounds: {0}")]
    OutOfBounds(String),

    /// Propagated from the segment-file pool.
    #[error("segment-file I/O failure: {0}")]
    IoFailure(#[from] io::Error),

    /// The compression codec failed to decompress at every attempted
    /// output size, or compression produced oversize output.
    #[error("codec failure: {0}")]
    CodecFailure(String),
}

impl Error {
    pub fn checksum_mismatch(context: &'static str, expected: u32, actual: u32) -> Self {
        Error::ChecksumMismatch {
            context,
            expected,
            actual,
        }
    }

    pub fn truncated(context: &'static str, offset: u64) -> Self {
        Error::Truncated { context, offset }
    }
}
