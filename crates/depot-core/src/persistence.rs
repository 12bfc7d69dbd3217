//! Engine persistence
//!
//! The engine hands a complete `EngineSnapshot` to a `PersistenceProvider`
//! and rebuilds indexes and the dependency graph from the entities on load,
//! so only the canonical data is ever stored.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{DepotError, Result};
use crate::model::Entity;
use crate::versioning::VersionArchive;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Everything needed to restore an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub format_version: u32,
    pub saved_at: DateTime<Utc>,
    /// Sorted by id
    pub entities: Vec<Entity>,
    pub versions: VersionArchive,
}

impl EngineSnapshot {
    pub fn new(entities: Vec<Entity>, versions: VersionArchive, saved_at: DateTime<Utc>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            saved_at,
            entities,
            versions,
        }
    }

    /// # Errors
    ///
    /// Returns `Serialization` if encoding fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decode and check the format version
    ///
    /// # Errors
    ///
    /// Returns `Serialization` for malformed input and `Persistence` for an
    /// unsupported format version.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: EngineSnapshot = serde_json::from_slice(bytes)?;
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(DepotError::Persistence {
                message: format!(
                    "unsupported snapshot format version {} (expected {})",
                    snapshot.format_version, SNAPSHOT_FORMAT_VERSION
                ),
            });
        }
        Ok(snapshot)
    }
}

/// Storage backend for engine snapshots
#[async_trait]
pub trait PersistenceProvider: Send + Sync {
    async fn save(&self, key: &str, snapshot: &EngineSnapshot) -> Result<()>;

    /// `None` if nothing was ever saved under `key`
    async fn load(&self, key: &str) -> Result<Option<EngineSnapshot>>;
}

/// Process-local provider, mostly for tests
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    slots: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .slots
            .lock()
            .map(|slots| slots.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

fn poisoned() -> DepotError {
    DepotError::Persistence {
        message: "in-memory store lock poisoned".to_string(),
    }
}

#[async_trait]
impl PersistenceProvider for InMemoryPersistence {
    async fn save(&self, key: &str, snapshot: &EngineSnapshot) -> Result<()> {
        let bytes = snapshot.to_json_bytes()?;
        self.slots
            .lock()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), bytes);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<EngineSnapshot>> {
        let bytes = self.slots.lock().map_err(|_| poisoned())?.get(key).cloned();
        bytes
            .map(|b| EngineSnapshot::from_json_bytes(&b))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityType;

    fn snapshot() -> EngineSnapshot {
        EngineSnapshot::new(
            vec![Entity::new("a", "A", EntityType::General)],
            VersionArchive::default(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_in_memory_save_load() {
        let store = InMemoryPersistence::new();
        let snap = snapshot();
        store.save("k", &snap).await.unwrap();

        assert_eq!(store.load("k").await.unwrap(), Some(snap));
        assert_eq!(store.load("other").await.unwrap(), None);
        assert_eq!(store.keys(), vec!["k".to_string()]);
    }

    #[test]
    fn test_rejects_future_format() {
        let mut snap = snapshot();
        snap.format_version = 99;
        let bytes = serde_json::to_vec(&snap).unwrap();
        assert!(matches!(
            EngineSnapshot::from_json_bytes(&bytes),
            Err(DepotError::Persistence { .. })
        ));
    }

    #[test]
    fn test_malformed_bytes() {
        assert!(matches!(
            EngineSnapshot::from_json_bytes(b"{not json"),
            Err(DepotError::Serialization { .. })
        ));
    }
}
