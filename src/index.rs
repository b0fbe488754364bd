//! Read-only membership queries over 20-byte HASH160 fingerprints.
//!
//! The on-disk format is the simplest thing that supports a shared-nothing
//! concurrent `contains`: ascending-sorted fixed-width 20-byte records,
//! memory-mapped and binary-searched.

use std::io;
use std::path::Path;

use fxhash::FxHashSet;
use memmap2::Mmap;

use crate::error::{Result, ScanError};

pub const HASH160_SIZE: usize = 20;

/// Narrow interface to the precomputed address set. Implementations must be
/// safe for concurrent readers.
pub trait AddressIndex: Send + Sync {
    fn contains(&self, hash160: &[u8; HASH160_SIZE]) -> io::Result<bool>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Memory-mapped sorted record file.
pub struct MmapIndex {
    map: Mmap,
    records: usize,
}

impl MmapIndex {
    /// Map the file read-only. Fails if the length is not a whole number of
    /// records.
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| ScanError::Index {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let map = unsafe { Mmap::map(&file) }.map_err(|e| ScanError::Index {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        if map.len() % HASH160_SIZE != 0 {
            return Err(ScanError::Index {
                path: path.display().to_string(),
                message: format!(
                    "length {} is not a multiple of the {}-byte record size",
                    map.len(),
                    HASH160_SIZE
                ),
            });
        }

        let records = map.len() / HASH160_SIZE;
        Ok(Self { map, records })
    }

    #[inline]
    fn record(&self, i: usize) -> &[u8] {
        &self.map[i * HASH160_SIZE..(i + 1) * HASH160_SIZE]
    }
}

impl AddressIndex for MmapIndex {
    fn contains(&self, hash160: &[u8; HASH160_SIZE]) -> io::Result<bool> {
        let mut lo = 0usize;
        let mut hi = self.records;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.record(mid).cmp(hash160.as_slice()) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Ok(true),
            }
        }
        Ok(false)
    }

    fn len(&self) -> usize {
        self.records
    }
}

/// Hash-set index, used by tests and for small ad-hoc address lists.
#[derive(Default)]
pub struct MemoryIndex {
    set: FxHashSet<[u8; HASH160_SIZE]>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, hash160: [u8; HASH160_SIZE]) {
        self.set.insert(hash160);
    }
}

impl FromIterator<[u8; HASH160_SIZE]> for MemoryIndex {
    fn from_iter<I: IntoIterator<Item = [u8; HASH160_SIZE]>>(iter: I) -> Self {
        Self {
            set: iter.into_iter().collect(),
        }
    }
}

impl AddressIndex for MemoryIndex {
    fn contains(&self, hash160: &[u8; HASH160_SIZE]) -> io::Result<bool> {
        Ok(self.set.contains(hash160))
    }

    fn len(&self) -> usize {
        self.set.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_index(name: &str, records: &[[u8; 20]]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut sorted = records.to_vec();
        sorted.sort();
        let mut file = std::fs::File::create(&path).unwrap();
        for record in &sorted {
            file.write_all(record).unwrap();
        }
        path
    }

    #[test]
    fn mmap_index_finds_only_written_records() {
        let a = [0x11u8; 20];
        let b = [0x77u8; 20];
        let c = [0xEEu8; 20];
        let path = write_index("keysweep_index_lookup.idx", &[c, a, b]);

        let index = MmapIndex::open(&path).unwrap();
        assert_eq!(index.len(), 3);
        assert!(index.contains(&a).unwrap());
        assert!(index.contains(&b).unwrap());
        assert!(index.contains(&c).unwrap());
        assert!(!index.contains(&[0x00u8; 20]).unwrap());
        assert!(!index.contains(&[0xFFu8; 20]).unwrap());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn mmap_index_rejects_ragged_file() {
        let path = std::env::temp_dir().join("keysweep_index_ragged.idx");
        std::fs::write(&path, [0u8; 21]).unwrap();
        assert!(MmapIndex::open(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn memory_index_contains() {
        let index: MemoryIndex = [[0xABu8; 20]].into_iter().collect();
        assert!(index.contains(&[0xABu8; 20]).unwrap());
        assert!(!index.contains(&[0xACu8; 20]).unwrap());
    }
}
