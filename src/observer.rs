//! Per-handle diagnostic sink (Design Notes redesign flag: the source's
//! global mutable notify-verbose flag is lifted here into a trait object
//! passed at handle construction, rather than a process-wide switch).
//!
//! The default implementation, [`LogObserver`], forwards every event to
//! the `log` crate at the level the teacher crate already uses for the
//! same situations (`log::warn!` for recoverable anomalies, `log::error!`
//! for anomalies that force a fallback, `log::debug!`/`log::info!` for
//! routine progress).

use log::{debug, info, warn};

/// Receives notifications about recoverable anomalies encountered while
/// reading or writing an EWF container.
///
/// All methods have a no-op default so implementers only override what
/// they care about.
pub trait Observer {
    /// A v1 section declared `size == 0`; the reader reconstructed it from
    /// `next_offset - start_offset`.
    fn section_size_reconstructed(&self, _section_type: &str, _reconstructed_size: u64) {}

    /// A chunk's per-chunk Adler-32 did not match; the chunk is tainted and
    /// reading continues.
    fn chunk_tainted(&self, _chunk_index: usize) {}

    /// A tainted chunk was replaced by a clean entry from a `table2` mirror.
    fn chunk_corrected(&self, _chunk_index: usize) {}

    /// A table2 mirror disagreed with the primary table on value other than
    /// taint status (still uses the primary taint state).
    fn table_mirror_mismatch(&self, _reason: &str) {}

    /// An unrecognized section type was skipped.
    fn section_skipped(&self, _section_type: &str, _size: u64) {}

    /// A segment ended without reaching a `done`/`next` terminator.
    fn segment_truncated(&self, _segment_index: usize, _offset: u64) {}

    /// The SMART (EWF-S01) table footer checksum was not present/verified.
    fn smart_table_checksum_unverified(&self) {}

    /// Chunk geometry exceeded INT32_MAX and was clamped to the minimum
    /// chunk size rather than rejected (lenient `Config` path).
    fn chunk_size_clamped(&self, _requested: u64, _clamped: u32) {}

    /// General informational progress (segment opened, header parsed, ...).
    fn info(&self, _message: &str) {}
}

/// Default [`Observer`] that forwards every event to the `log` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn section_size_reconstructed(&self, section_type: &str, reconstructed_size: u64) {
        warn!(
            "section '{}' declared size 0; reconstructed size {}",
            section_type, reconstructed_size
        );
    }

    fn chunk_tainted(&self, chunk_index: usize) {
        warn!("chunk {} failed its per-chunk checksum; marked tainted", chunk_index);
    }

    fn chunk_corrected(&self, chunk_index: usize) {
        info!("chunk {} corrected from table2 mirror", chunk_index);
    }

    fn table_mirror_mismatch(&self, reason: &str) {
        warn!("table/table2 mismatch: {}", reason);
    }

    fn section_skipped(&self, section_type: &str, size: u64) {
        debug!("skipping unknown section '{}' ({} bytes)", section_type, size);
    }

    fn segment_truncated(&self, segment_index: usize, offset: u64) {
        warn!(
            "segment {} truncated before reaching a terminator (stopped at {:#x})",
            segment_index, offset
        );
    }

    fn smart_table_checksum_unverified(&self) {
        warn!("SMART (EWF-S01) table offsets were not checksum-verified");
    }

    fn chunk_size_clamped(&self, requested: u64, clamped: u32) {
        warn!(
            "chunk size {} exceeds INT32_MAX; clamped to minimum chunk size {}",
            requested, clamped
        );
    }

    fn info(&self, message: &str) {
        info!("{}", message);
    }
}

/// [`Observer`] that discards every event; useful for tests that assert on
/// return values rather than log output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {}
