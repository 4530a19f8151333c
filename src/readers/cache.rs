//! Byte-offset cache files.
//!
//! A cache is a packed array of little-endian unsigned 64-bit offsets into a
//! companion CSV file, produced by the preprocessing step and namespaced by
//! the scenario id so runs with the same partitioning share them. The people
//! and locations caches hold one offset per partition; the interactions
//! cache holds one offset per person per distinct-visit day.

use crate::error::NososError;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Sentinel offset meaning "no visits that day".
pub const EMPTY_VISIT_SCHEDULE: u64 = u64::MAX;

pub struct OffsetCache {
    file: BufReader<File>,
    num_entries: u64,
}

impl OffsetCache {
    pub fn open(path: &Path) -> Result<OffsetCache, NososError> {
        let file = File::open(path).map_err(|error| {
            NososError::Config(format!("could not open cache {}: {error}", path.display()))
        })?;
        let len = file.metadata()?.len();
        if len % 8 != 0 {
            return Err(NososError::Data(format!(
                "cache {} holds {len} bytes, not a multiple of 8",
                path.display()
            )));
        }
        Ok(OffsetCache {
            file: BufReader::new(file),
            num_entries: len / 8,
        })
    }

    #[must_use]
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Reads the offset at `index`.
    pub fn read_at(&mut self, index: u64) -> Result<u64, NososError> {
        if index >= self.num_entries {
            return Err(NososError::Data(format!(
                "cache entry {index} beyond the {} stored",
                self.num_entries
            )));
        }
        self.file.seek(SeekFrom::Start(index * 8))?;
        let mut buffer = [0u8; 8];
        self.file.read_exact(&mut buffer)?;
        Ok(u64::from_le_bytes(buffer))
    }

    /// Reads `count` consecutive offsets starting at `start`.
    pub fn read_run(&mut self, start: u64, count: usize) -> Result<Vec<u64>, NososError> {
        if start + count as u64 > self.num_entries {
            return Err(NososError::Data(format!(
                "cache entries [{start}, {}) beyond the {} stored",
                start + count as u64,
                self.num_entries
            )));
        }
        self.file.seek(SeekFrom::Start(start * 8))?;
        let mut offsets = Vec::with_capacity(count);
        let mut buffer = [0u8; 8];
        for _ in 0..count {
            self.file.read_exact(&mut buffer)?;
            offsets.push(u64::from_le_bytes(buffer));
        }
        Ok(offsets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_cache(offsets: &[u64]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for offset in offsets {
            file.write_all(&offset.to_le_bytes()).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn reads_little_endian_offsets() {
        let file = write_cache(&[0, 517, EMPTY_VISIT_SCHEDULE]);
        let mut cache = OffsetCache::open(file.path()).unwrap();
        assert_eq!(cache.num_entries(), 3);
        assert_eq!(cache.read_at(1).unwrap(), 517);
        assert_eq!(cache.read_at(2).unwrap(), EMPTY_VISIT_SCHEDULE);
        assert_eq!(cache.read_run(0, 2).unwrap(), vec![0, 517]);
    }

    #[test]
    fn out_of_range_entry_is_a_data_error() {
        let file = write_cache(&[1, 2]);
        let mut cache = OffsetCache::open(file.path()).unwrap();
        assert!(matches!(cache.read_at(2), Err(NososError::Data(_))));
        assert!(matches!(cache.read_run(1, 2), Err(NososError::Data(_))));
    }

    #[test]
    fn truncated_cache_is_a_data_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
        file.flush().unwrap();
        assert!(matches!(
            OffsetCache::open(file.path()),
            Err(NososError::Data(_))
        ));
    }

    #[test]
    fn missing_cache_is_a_config_error() {
        assert!(matches!(
            OffsetCache::open(Path::new("/definitely/not/here.cache")),
            Err(NososError::Config(_))
        ));
    }
}
