use memmap2::MmapOptions;
use std::fs::File;
use std::io;
use std::path::Path;
use xxhash_rust::xxh3::xxh3_128;

/// Default size above which files are memory-mapped instead of read.
pub const DEFAULT_MMAP_THRESHOLD: u64 = 1_048_576;

pub fn hash_bytes(data: &[u8]) -> String {
    let hash = xxh3_128(data);
    format!("{hash:032x}")
}

/// Hashes the full content of `path`.
///
/// Files smaller than `mmap_threshold` are read into memory; larger ones are
/// memory-mapped.
///
/// # Errors
///
/// Returns the underlying io error if the file cannot be opened or read.
pub fn hash_file(path: &Path, mmap_threshold: u64) -> io::Result<String> {
    let file = File::open(path)?;
    let metadata = file.metadata()?;

    if metadata.len() == 0 {
        return Ok(hash_bytes(b""));
    }

    if metadata.len() < mmap_threshold {
        let content = std::fs::read(path)?;
        Ok(hash_bytes(&content))
    } else {
        // SAFETY: read-only mapping, dropped before returning
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(hash_bytes(&mmap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_hash_bytes() {
        let data = b"Hello, World!";
        let hash1 = hash_bytes(data);
        let hash2 = hash_bytes(data);
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 32);

        let different_data = b"Different data";
        let hash3 = hash_bytes(different_data);
        assert_ne!(hash1, hash3);
    }

    #[test]
    fn test_hash_file_matches_bytes() -> io::Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.txt");
        std::fs::write(&file_path, "Test content for hashing")?;

        let hash = hash_file(&file_path, DEFAULT_MMAP_THRESHOLD)?;
        assert_eq!(hash, hash_bytes(b"Test content for hashing"));

        Ok(())
    }

    #[test]
    fn test_hash_file_mmap_path_agrees() -> io::Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("big.bin");
        std::fs::write(&file_path, vec![7u8; 4096])?;

        // Threshold below the file size forces the mmap branch
        let mapped = hash_file(&file_path, 1024)?;
        let read = hash_file(&file_path, DEFAULT_MMAP_THRESHOLD)?;
        assert_eq!(mapped, read);

        Ok(())
    }

    #[test]
    fn test_empty_file_hash() -> io::Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("empty");
        std::fs::write(&file_path, "")?;

        assert_eq!(hash_file(&file_path, DEFAULT_MMAP_THRESHOLD)?, hash_bytes(b""));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        let result = hash_file(&dir.path().join("absent"), DEFAULT_MMAP_THRESHOLD);
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
