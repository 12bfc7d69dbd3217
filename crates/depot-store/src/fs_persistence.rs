//! Filesystem snapshot persistence
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/blobs/<ab>/<digest>.json   snapshot bytes, content addressed
//! <root>/keys/<key>.json            pointer to the latest blob for a key
//! ```
//!
//! A key may contain `/` to nest pointers in subdirectories. Saving writes
//! the blob before the pointer, so a crash leaves the previous pointer
//! intact.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use depot_core::errors::ExError;
use depot_core::{log_op_end, log_op_error, log_op_start, EngineSnapshot, PersistenceProvider};
use serde::{Deserialize, Serialize};

use crate::blob::{atomic_write, BlobStore};
use crate::errors::{from_serde, into_depot, invalid_key, io_error, Result};

/// Contents of a key file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPointer {
    pub key: String,
    pub digest: String,
    pub format_version: u32,
    pub entity_count: usize,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FsPersistence {
    root: PathBuf,
    blobs: BlobStore,
    keys_root: PathBuf,
}

impl FsPersistence {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            blobs: BlobStore::new(root.join("blobs")),
            keys_root: root.join("keys"),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Write a snapshot and point `key` at it
    pub fn write_snapshot(&self, key: &str, snapshot: &EngineSnapshot) -> Result<KeyPointer> {
        log_op_start!("fs_save", key = key);
        let start = Instant::now();

        match self.write_snapshot_impl(key, snapshot) {
            Ok(pointer) => {
                log_op_end!(
                    "fs_save",
                    duration_ms = start.elapsed().as_millis() as u64,
                    key = key,
                    digest = pointer.digest.as_str()
                );
                Ok(pointer)
            }
            Err(e) => {
                log_op_error!("fs_save", e.clone(), duration_ms = start.elapsed().as_millis() as u64);
                Err(e)
            }
        }
    }

    fn write_snapshot_impl(&self, key: &str, snapshot: &EngineSnapshot) -> Result<KeyPointer> {
        let path = self.key_path(key)?;
        let bytes = snapshot.to_json_bytes().map_err(ExError::from)?;
        let digest = self.blobs.write(&bytes)?;

        let pointer = KeyPointer {
            key: key.to_string(),
            digest,
            format_version: snapshot.format_version,
            entity_count: snapshot.entities.len(),
            saved_at: snapshot.saved_at,
        };
        let encoded =
            serde_json::to_vec_pretty(&pointer).map_err(|e| from_serde("encode_pointer", e))?;
        atomic_write(&path, &encoded)?;
        Ok(pointer)
    }

    /// Snapshot stored under `key`, `None` if the key was never saved
    pub fn read_snapshot(&self, key: &str) -> Result<Option<EngineSnapshot>> {
        log_op_start!("fs_load", key = key);
        let start = Instant::now();

        match self.read_snapshot_impl(key) {
            Ok(found) => {
                log_op_end!(
                    "fs_load",
                    duration_ms = start.elapsed().as_millis() as u64,
                    key = key,
                    found = found.is_some()
                );
                Ok(found)
            }
            Err(e) => {
                log_op_error!("fs_load", e.clone(), duration_ms = start.elapsed().as_millis() as u64);
                Err(e)
            }
        }
    }

    fn read_snapshot_impl(&self, key: &str) -> Result<Option<EngineSnapshot>> {
        let Some(pointer) = self.pointer(key)? else {
            return Ok(None);
        };
        let bytes = self.blobs.read(&pointer.digest)?;
        let snapshot = EngineSnapshot::from_json_bytes(&bytes).map_err(ExError::from)?;
        Ok(Some(snapshot))
    }

    pub fn pointer(&self, key: &str) -> Result<Option<KeyPointer>> {
        let path = self.key_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| io_error("read_pointer", e))?;
        let pointer = serde_json::from_slice(&bytes).map_err(|e| from_serde("decode_pointer", e))?;
        Ok(Some(pointer))
    }

    /// Every saved key, sorted
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        if self.keys_root.exists() {
            collect_keys(&self.keys_root, "", &mut keys)?;
        }
        keys.sort();
        Ok(keys)
    }

    /// Forget a key; its blob stays until `collect_garbage`
    pub fn remove(&self, key: &str) -> Result<bool> {
        let path = self.key_path(key)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| io_error("remove_pointer", e))?;
        Ok(true)
    }

    /// Delete blobs no key points at; returns how many were removed
    pub fn collect_garbage(&self) -> Result<usize> {
        let mut live = std::collections::BTreeSet::new();
        for key in self.keys()? {
            if let Some(pointer) = self.pointer(&key)? {
                live.insert(pointer.digest);
            }
        }

        let mut removed = 0;
        for digest in self.blobs.list()? {
            if !live.contains(&digest) && self.blobs.remove(&digest)? {
                removed += 1;
            }
        }
        tracing::info!(removed, live = live.len(), "blob garbage collected");
        Ok(removed)
    }

    /// Map a key to its pointer file, rejecting keys that escape the root
    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(invalid_key(key, "key must not be empty"));
        }
        let mut path = self.keys_root.clone();
        let segments: Vec<&str> = key.split('/').collect();
        for segment in &segments {
            if segment.is_empty() || *segment == "." || *segment == ".." {
                return Err(invalid_key(key, "empty or relative path segment"));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            {
                return Err(invalid_key(key, "segments may only use [A-Za-z0-9._-]"));
            }
        }
        if let Some((last, parents)) = segments.split_last() {
            for parent in parents {
                path.push(parent);
            }
            path.push(format!("{}.json", last));
        }
        Ok(path)
    }
}

fn collect_keys(dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir).map_err(|e| io_error("list_keys", e))? {
        let path = entry.map_err(|e| io_error("list_keys", e))?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_dir() {
            collect_keys(&path, &format!("{}{}/", prefix, name), out)?;
        } else if let Some(stem) = name.strip_suffix(".json") {
            out.push(format!("{}{}", prefix, stem));
        }
    }
    Ok(())
}

#[async_trait]
impl PersistenceProvider for FsPersistence {
    async fn save(&self, key: &str, snapshot: &EngineSnapshot) -> depot_core::Result<()> {
        self.write_snapshot(key, snapshot).map(|_| ()).map_err(into_depot)
    }

    async fn load(&self, key: &str) -> depot_core::Result<Option<EngineSnapshot>> {
        self.read_snapshot(key).map_err(into_depot)
    }
}
