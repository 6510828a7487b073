//! Segment-file pool (§1 external collaborator, §5, §6.1).
//!
//! The spec treats pooled file I/O as an external collaborator: "an opaque
//! handle indexable by entry id, positioned read/write". [`SegmentFilePool`]
//! is that seam. [`FileSegmentPool`] is a convenience default implementation
//! backed by `std::fs::File`, grounded on the teacher's own segment
//! discovery (`find_files` in `examples/forensicxlab-exhume_body/src/ewf.rs`)
//! generalized from its 2-character numeric suffix to the full
//! `.E01..E99,.EAA..` continuation scheme (§6.1).

use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A caller-supplied, ordered collection of segment files with positioned
/// read/write access. Entries are indexed `0..len()`, in segment order.
///
/// Implementations own their own cursor management; the core engine never
/// assumes a pool entry's file position survives between calls, since it
/// always seeks explicitly before reading or writing (§5).
pub trait SegmentFilePool {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads exactly `buf.len()` bytes from `entry` at `offset`.
    fn read_at(&mut self, entry: usize, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Writes `buf` to `entry` at `offset`.
    fn write_at(&mut self, entry: usize, offset: u64, buf: &[u8]) -> Result<()>;

    /// Current length in bytes of `entry`.
    fn entry_len(&mut self, entry: usize) -> Result<u64>;

    /// Truncates `entry` to `len` bytes (used to discard a partially
    /// written segment after a failed write, §7's propagation policy).
    fn truncate(&mut self, entry: usize, len: u64) -> Result<()>;

    /// Appends a new, empty entry to the pool and returns its index.
    fn push_new(&mut self, path: PathBuf) -> Result<usize>;
}

/// Default [`SegmentFilePool`] backed by real files on disk.
pub struct FileSegmentPool {
    paths: Vec<PathBuf>,
    files: Vec<File>,
}

impl FileSegmentPool {
    /// Opens every segment belonging to the same multi-part image as
    /// `first_segment_path`, in segment order.
    pub fn open_existing(first_segment_path: &Path) -> Result<Self> {
        let paths = discover_segment_paths(first_segment_path)?;
        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            files.push(OpenOptions::new().read(true).write(true).open(path)?);
        }
        Ok(FileSegmentPool { paths, files })
    }

    /// Starts an empty pool that will be grown with [`SegmentFilePool::push_new`].
    pub fn new() -> Self {
        FileSegmentPool {
            paths: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn path(&self, entry: usize) -> Option<&Path> {
        self.paths.get(entry).map(PathBuf::as_path)
    }
}

impl Default for FileSegmentPool {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentFilePool for FileSegmentPool {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn read_at(&mut self, entry: usize, offset: u64, buf: &mut [u8]) -> Result<()> {
        let file = self
            .files
            .get_mut(entry)
            .ok_or_else(|| Error::OutOfBounds(format!("no such segment entry {}", entry)))?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::truncated("segment read", offset)
            } else {
                Error::IoFailure(e)
            }
        })
    }

    fn write_at(&mut self, entry: usize, offset: u64, buf: &[u8]) -> Result<()> {
        let file = self
            .files
            .get_mut(entry)
            .ok_or_else(|| Error::OutOfBounds(format!("no such segment entry {}", entry)))?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn entry_len(&mut self, entry: usize) -> Result<u64> {
        let file = self
            .files
            .get(entry)
            .ok_or_else(|| Error::OutOfBounds(format!("no such segment entry {}", entry)))?;
        Ok(file.metadata()?.len())
    }

    fn truncate(&mut self, entry: usize, len: u64) -> Result<()> {
        let file = self
            .files
            .get(entry)
            .ok_or_else(|| Error::OutOfBounds(format!("no such segment entry {}", entry)))?;
        file.set_len(len)?;
        Ok(())
    }

    fn push_new(&mut self, path: PathBuf) -> Result<usize> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        self.paths.push(path);
        self.files.push(file);
        Ok(self.files.len() - 1)
    }
}

/// Given any one segment's path, finds every segment belonging to the same
/// multi-part image by replacing the numeric/alpha-numeric suffix with a
/// glob wildcard and sorting the matches (§6.1).
fn discover_segment_paths(path: &Path) -> Result<Vec<PathBuf>> {
    let path = path
        .canonicalize()
        .map_err(|_| Error::OutOfBounds(format!("invalid segment path: {}", path.display())))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::OutOfBounds("segment path has no valid file name".into()))?;

    if filename.len() < 2 {
        return Err(Error::OutOfBounds("segment file name too short".into()));
    }

    let base = &filename[..filename.len() - 2];
    let parent = path
        .parent()
        .ok_or_else(|| Error::OutOfBounds("segment path has no parent directory".into()))?;

    let pattern = parent.join(format!("{}??", base));
    let pattern = pattern
        .to_str()
        .ok_or_else(|| Error::OutOfBounds("non-UTF8 segment path".into()))?;

    let mut paths: Vec<PathBuf> = glob::glob(pattern)
        .map_err(|e| Error::OutOfBounds(format!("invalid glob pattern: {e}")))?
        .filter_map(std::result::Result::ok)
        .collect();
    paths.sort_by(|a, b| segment_sort_key(a).cmp(&segment_sort_key(b)));
    Ok(paths)
}

/// Extension continuation order: `.E01 < .E02 < ... < .E99 < .EAA < .EAB < ...`
/// (§6.1's 26x26 continuation scheme). Returns a key that sorts correctly
/// across the numeric and alphabetic ranges.
fn segment_sort_key(path: &Path) -> (u8, u32) {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let suffix = &ext[ext.len().saturating_sub(2)..];
    if let Ok(n) = suffix.parse::<u32>() {
        return (0, n);
    }
    let mut chars = suffix.chars();
    let (hi, lo) = (chars.next().unwrap_or('0'), chars.next().unwrap_or('0'));
    (1, (hi as u32) * 256 + lo as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn pushed_entries_can_be_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = FileSegmentPool::new();
        let entry = pool.push_new(dir.path().join("image.E01")).unwrap();
        pool.write_at(entry, 0, b"hello").unwrap();

        let mut buf = [0u8; 5];
        pool.read_at(entry, 0, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn truncate_shrinks_entry_length() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = FileSegmentPool::new();
        let entry = pool.push_new(dir.path().join("image.E01")).unwrap();
        pool.write_at(entry, 0, b"0123456789").unwrap();
        assert_eq!(pool.entry_len(entry).unwrap(), 10);

        pool.truncate(entry, 4).unwrap();
        assert_eq!(pool.entry_len(entry).unwrap(), 4);
    }

    #[test]
    fn discovers_every_segment_of_a_multi_part_image() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["image.E01", "image.E02", "image.E03"] {
            File::create(dir.path().join(name)).unwrap().write_all(b"x").unwrap();
        }

        let pool = FileSegmentPool::open_existing(&dir.path().join("image.E01")).unwrap();
        assert_eq!(pool.len(), 3);
        assert!(pool.path(0).unwrap().to_string_lossy().ends_with("E01"));
        assert!(pool.path(2).unwrap().to_string_lossy().ends_with("E03"));
    }
}
