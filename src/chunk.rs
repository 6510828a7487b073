//! Chunk descriptor, chunk group, and the global offset table (§3.1, §4.5).

use crate::error::{Error, Result};
use crate::observer::Observer;

/// Physical location of one compressed (or stored) chunk (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// Which segment-file-pool entry physically holds the chunk's bytes.
    /// May differ from the segment holding the owning table (invariant 8).
    pub segment: usize,
    /// Byte offset within that segment file.
    pub offset: u64,
    /// Compressed size in bytes (includes the trailing per-chunk Adler-32
    /// when the owning image writes one).
    pub size: u32,
    pub compressed: bool,
    /// Set when the chunk's per-chunk checksum failed to verify; cleared by
    /// a successful `table2` correction.
    pub tainted: bool,
    /// Set by a delta-chunk section overriding a previously stored chunk
    /// (invariant 9: always uncompressed when set).
    pub dirty: bool,
}

impl ChunkDescriptor {
    pub fn new(segment: usize, offset: u64, size: u32, compressed: bool) -> Self {
        ChunkDescriptor {
            segment,
            offset,
            size,
            compressed,
            tainted: false,
            dirty: false,
        }
    }
}

/// Ordered chunks covered by one `table` section (§3.1).
#[derive(Debug, Clone)]
pub struct ChunkGroup {
    pub chunk_size: u32,
    pub base_offset: u64,
    /// Logical chunk index of `entries[0]` within the whole image.
    pub first_chunk_number: usize,
    pub entries: Vec<ChunkDescriptor>,
}

impl ChunkGroup {
    pub fn new(chunk_size: u32, base_offset: u64, first_chunk_number: usize) -> Self {
        ChunkGroup {
            chunk_size,
            base_offset,
            first_chunk_number,
            entries: Vec::new(),
        }
    }

    pub fn number_of_entries(&self) -> usize {
        self.entries.len()
    }

    /// Replaces a tainted entry in this group with the corresponding entry
    /// from `mirror`, clearing the taint, provided the mirror entry is
    /// itself clean (§4.5 "Correct algorithm (table2 mirror)").
    pub fn correct_from_mirror(&mut self, mirror: &ChunkGroup, observer: &dyn Observer) -> Result<()> {
        if self.number_of_entries() != mirror.number_of_entries()
            || self.base_offset != mirror.base_offset
        {
            return Err(Error::FormatInvariant(format!(
                "table2 geometry mismatch: entries {} vs {}, base_offset {:#x} vs {:#x}",
                self.number_of_entries(),
                mirror.number_of_entries(),
                self.base_offset,
                mirror.base_offset
            )));
        }

        for (index, (primary, mirrored)) in self
            .entries
            .iter_mut()
            .zip(mirror.entries.iter())
            .enumerate()
        {
            if primary.tainted {
                if !mirrored.tainted {
                    let logical_index = self.first_chunk_number + index;
                    *primary = *mirrored;
                    primary.tainted = false;
                    observer.chunk_corrected(logical_index);
                }
                // Both tainted: keep the (still tainted) primary as-is.
            }
        }
        Ok(())
    }
}

/// Global `chunk_index -> ChunkDescriptor` map, grown as successive table
/// sections are read (§3.1). Absent entries are represented by `None`
/// rather than a sentinel offset, per the Design Notes guidance.
#[derive(Debug, Clone, Default)]
pub struct OffsetTable {
    slots: Vec<Option<ChunkDescriptor>>,
}

impl OffsetTable {
    pub fn new() -> Self {
        OffsetTable { slots: Vec::new() }
    }

    /// Pre-sizes the table once `number_of_chunks` is known from the volume
    /// section.
    pub fn with_capacity(number_of_chunks: usize) -> Self {
        OffsetTable {
            slots: vec![None; number_of_chunks],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Installs every entry of `group` at `group.first_chunk_number..`,
    /// growing the table if necessary.
    pub fn extend_from_group(&mut self, group: &ChunkGroup) {
        let needed = group.first_chunk_number + group.number_of_entries();
        if needed > self.slots.len() {
            self.slots.resize(needed, None);
        }
        for (offset, entry) in group.entries.iter().enumerate() {
            self.slots[group.first_chunk_number + offset] = Some(*entry);
        }
    }

    pub fn get(&self, chunk_index: usize) -> Option<&ChunkDescriptor> {
        self.slots.get(chunk_index).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, chunk_index: usize) -> Option<&mut ChunkDescriptor> {
        self.slots.get_mut(chunk_index).and_then(|slot| slot.as_mut())
    }

    /// Installs or overrides a single entry, used by delta-chunk sections
    /// (invariant 9).
    pub fn set(&mut self, chunk_index: usize, descriptor: ChunkDescriptor) {
        if chunk_index >= self.slots.len() {
            self.slots.resize(chunk_index + 1, None);
        }
        self.slots[chunk_index] = Some(descriptor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;

    fn entry(offset: u64, compressed: bool) -> ChunkDescriptor {
        ChunkDescriptor::new(1, offset, 0x100, compressed)
    }

    #[test]
    fn table_round_trip_preserves_compressed_flag() {
        let mut group = ChunkGroup::new(0x8000, 0x1000, 0);
        group.entries.push(entry(0x1010, true));
        group.entries.push(entry(0x1110, false));

        let mut table = OffsetTable::new();
        table.extend_from_group(&group);

        assert_eq!(table.get(0), Some(&entry(0x1010, true)));
        assert_eq!(table.get(1), Some(&entry(0x1110, false)));
    }

    #[test]
    fn correction_clears_taint_from_clean_mirror() {
        let mut primary = ChunkGroup::new(0x8000, 0x1000, 0);
        primary.entries.push(entry(0x1010, true));
        primary.entries[0].tainted = true;

        let mut mirror = ChunkGroup::new(0x8000, 0x1000, 0);
        mirror.entries.push(entry(0x1010, true));

        primary.correct_from_mirror(&mirror, &NullObserver).unwrap();

        assert!(!primary.entries[0].tainted);
        assert_eq!(primary.entries[0], mirror.entries[0]);
    }

    #[test]
    fn correction_keeps_taint_when_mirror_also_tainted() {
        let mut primary = ChunkGroup::new(0x8000, 0x1000, 0);
        primary.entries.push(entry(0x1010, true));
        primary.entries[0].tainted = true;

        let mut mirror = ChunkGroup::new(0x8000, 0x1000, 0);
        mirror.entries.push(entry(0x1010, true));
        mirror.entries[0].tainted = true;

        primary.correct_from_mirror(&mirror, &NullObserver).unwrap();
        assert!(primary.entries[0].tainted);
    }

    #[test]
    fn geometry_mismatch_is_rejected() {
        let mut primary = ChunkGroup::new(0x8000, 0x1000, 0);
        primary.entries.push(entry(0x1010, true));

        let mirror = ChunkGroup::new(0x8000, 0x1000, 0);

        assert!(primary.correct_from_mirror(&mirror, &NullObserver).is_err());
    }
}
