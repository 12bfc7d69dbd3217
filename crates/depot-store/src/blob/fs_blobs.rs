//! Filesystem blob store
//!
//! Blobs are immutable and named by the SHA256 of their bytes. Reads
//! re-hash the bytes, so a blob edited or truncated on disk is reported
//! instead of being handed back.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::blob::atomic::atomic_write;
use crate::blob::sharding::shard_path;
use crate::errors::{blob_collision, blob_corrupt, blob_missing, io_error, Result};

/// SHA256 of `content`, hex encoded
pub fn compute_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `content` and return its digest
    ///
    /// Writing the same bytes twice is a no-op.
    pub fn write(&self, content: &[u8]) -> Result<String> {
        let digest = compute_digest(content);
        let target_path = shard_path(&self.root, &digest);

        if target_path.exists() {
            let existing = fs::read(&target_path).map_err(|e| io_error("read_blob", e))?;
            if existing == content {
                return Ok(digest);
            }
            return Err(blob_collision(&digest));
        }

        atomic_write(&target_path, content)?;
        tracing::debug!(digest = digest.as_str(), bytes = content.len(), "blob written");
        Ok(digest)
    }

    /// Read and verify a blob
    pub fn read(&self, digest: &str) -> Result<Vec<u8>> {
        let path = shard_path(&self.root, digest);
        if !path.exists() {
            return Err(blob_missing(digest));
        }
        let content = fs::read(&path).map_err(|e| io_error("read_blob", e))?;

        let actual = compute_digest(&content);
        if actual != digest {
            return Err(blob_corrupt(digest, &actual));
        }
        Ok(content)
    }

    pub fn contains(&self, digest: &str) -> bool {
        shard_path(&self.root, digest).exists()
    }

    /// Digests of every stored blob, sorted
    pub fn list(&self) -> Result<BTreeSet<String>> {
        let mut digests = BTreeSet::new();
        if !self.root.exists() {
            return Ok(digests);
        }
        for shard in fs::read_dir(&self.root).map_err(|e| io_error("list_blobs", e))? {
            let shard = shard.map_err(|e| io_error("list_blobs", e))?.path();
            if !shard.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&shard).map_err(|e| io_error("list_blobs", e))? {
                let path = entry.map_err(|e| io_error("list_blobs", e))?.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        digests.insert(stem.to_string());
                    }
                }
            }
        }
        Ok(digests)
    }

    /// Delete a blob; returns whether it existed
    pub fn remove(&self, digest: &str) -> Result<bool> {
        let path = shard_path(&self.root, digest);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| io_error("remove_blob", e))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::ExErrorKind;
    use tempfile::TempDir;

    fn setup() -> (BlobStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = BlobStore::new(temp_dir.path());
        (store, temp_dir)
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (store, _dir) = setup();
        let digest = store.write(b"{\"a\":1}").unwrap();

        assert_eq!(digest.len(), 64);
        assert_eq!(store.read(&digest).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn test_idempotent_write() {
        let (store, _dir) = setup();
        let d1 = store.write(b"same").unwrap();
        let d2 = store.write(b"same").unwrap();

        assert_eq!(d1, d2);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_collision_detected() {
        let (store, dir) = setup();
        let digest = store.write(b"original").unwrap();
        // Pretend a different payload already occupies the slot
        let slot = shard_path(dir.path(), &compute_digest(b"other"));
        fs::create_dir_all(slot.parent().unwrap()).unwrap();
        fs::write(&slot, b"not other").unwrap();

        let err = store.write(b"other").unwrap_err();
        assert_eq!(err.op(), Some("blob_write"));
        assert!(store.contains(&digest));
    }

    #[test]
    fn test_read_missing() {
        let (store, _dir) = setup();
        let err = store.read(&"0".repeat(64)).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NotFound);
    }

    #[test]
    fn test_read_detects_corruption() {
        let (store, dir) = setup();
        let digest = store.write(b"pristine").unwrap();
        fs::write(shard_path(dir.path(), &digest), b"tampered").unwrap();

        let err = store.read(&digest).unwrap_err();
        assert_eq!(err.op(), Some("blob_verify"));
    }

    #[test]
    fn test_remove() {
        let (store, _dir) = setup();
        let digest = store.write(b"gone soon").unwrap();

        assert!(store.remove(&digest).unwrap());
        assert!(!store.remove(&digest).unwrap());
        assert!(!store.contains(&digest));
    }
}
