//! Versioned binary serialization for index files.
//!
//! On-disk layout is a 4-byte little-endian `u32` format version followed by
//! a bincode payload of the [`Index`] enum. The version header is the single
//! source of truth for compatibility: there is no in-place migration, and a
//! mismatched file (older *or* newer) is deleted on read so the next update
//! rebuilds it from scratch.
//!
//! Serialization is deterministic: the file map is a `BTreeMap`, so the same
//! in-memory index always produces the same bytes, and a write-then-read
//! round-trip restores every field bit-identically.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::Index;

/// Current index file format version.
pub const INDEX_VERSION: u32 = 8;

/// Serialize `index` to `path` with the version header.
pub fn write_index(index: &Index, path: &Path) -> Result<()> {
    let payload = bincode::serialize(index)
        .map_err(|e| Error::InvalidArgument(format!("index serialization failed: {e}")))?;

    let mut bytes = Vec::with_capacity(4 + payload.len());
    bytes.extend_from_slice(&INDEX_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

/// Read an index file, enforcing the format version.
///
/// - A file shorter than the header is `CorruptIndex`.
/// - A version other than [`INDEX_VERSION`] deletes the file (best-effort)
///   and fails with `IndexVersionMismatch`; callers treat this exactly like
///   "no index exists" and rebuild.
/// - A payload that fails to deserialize is `CorruptIndex`.
pub fn read_index(path: &Path) -> Result<Index> {
    let bytes = fs::read(path)?;

    if bytes.len() < 4 {
        return Err(Error::CorruptIndex(path.to_path_buf()));
    }

    let found = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if found != INDEX_VERSION {
        let _ = fs::remove_file(path);
        return Err(Error::IndexVersionMismatch {
            filepath: path.to_path_buf(),
            found,
            expected: INDEX_VERSION,
        });
    }

    bincode::deserialize(&bytes[4..]).map_err(|_| Error::CorruptIndex(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmbeddingTask, FileRecord, Fragment};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_index() -> Index {
        let fragment = Fragment {
            start_line: 1,
            end_line: 42,
            embedding: vec![0.25, -1.5, 3.125, f32::MIN_POSITIVE],
            fragment_type: "document".to_string(),
            model: "embeddinggemma".to_string(),
            chunk_algorithm: "simple".to_string(),
            task: EmbeddingTask::RetrievalDocument,
            private: false,
            content_score: 73,
            hash: "deadbeef".to_string(),
        };
        let record = FileRecord {
            path: "/tmp/project/a.txt".to_string(),
            filename: "a.txt".to_string(),
            hash: "cafebabe".to_string(),
            creation_time: 1_700_000_000.25,
            last_modified: 1_700_000_100.5,
            fragments: vec![fragment],
        };
        let mut files = BTreeMap::new();
        files.insert(record.path.clone(), record);
        Index::GitRepo {
            path: "/tmp/project".to_string(),
            files,
            name: "project".to_string(),
            latest_commit_hash: "0123456789abcdef0123456789abcdef01234567".to_string(),
            is_dirty: true,
        }
    }

    #[test]
    fn write_then_read_round_trips_exactly() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("project.flat");

        let index = sample_index();
        write_index(&index, &path).unwrap();
        let restored = read_index(&path).unwrap();

        assert_eq!(index, restored);
    }

    #[test]
    fn write_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let p1 = tmp.path().join("a.flat");
        let p2 = tmp.path().join("b.flat");

        let index = sample_index();
        write_index(&index, &p1).unwrap();
        write_index(&index, &p2).unwrap();

        assert_eq!(fs::read(&p1).unwrap(), fs::read(&p2).unwrap());
    }

    #[test]
    fn header_is_little_endian_current_version() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.flat");
        write_index(&sample_index(), &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], &INDEX_VERSION.to_le_bytes());
    }

    #[test]
    fn version_mismatch_deletes_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.flat");

        let mut bytes = 999u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"whatever");
        fs::write(&path, bytes).unwrap();

        match read_index(&path) {
            Err(Error::IndexVersionMismatch {
                found, expected, ..
            }) => {
                assert_eq!(found, 999);
                assert_eq!(expected, INDEX_VERSION);
            }
            other => panic!("expected version mismatch, got {other:?}"),
        }
        assert!(!path.exists(), "mismatched file must be deleted");
    }

    #[test]
    fn older_version_is_equally_incompatible() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.flat");

        let mut bytes = 7u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"legacy payload");
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            read_index(&path),
            Err(Error::IndexVersionMismatch { found: 7, .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.flat");
        fs::write(&path, [8u8, 0]).unwrap();

        assert!(matches!(read_index(&path), Err(Error::CorruptIndex(_))));
        // Corrupt files are left in place; only version mismatches delete.
        assert!(path.exists());
    }

    #[test]
    fn garbage_payload_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.flat");

        let mut bytes = INDEX_VERSION.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0xff; 16]);
        fs::write(&path, bytes).unwrap();

        assert!(matches!(read_index(&path), Err(Error::CorruptIndex(_))));
    }
}
