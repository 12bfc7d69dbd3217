//! Validation-result cache
//!
//! Entries are keyed by entity id and carry a SHA-256 fingerprint of
//! `(id, version, content)`. A lookup hits only when the fingerprint still
//! matches and the entry is younger than the TTL. The cache is advisory:
//! dropping entries only forces validators to run again.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::Entity;

/// Fingerprint of the parts of an entity validation depends on
pub fn fingerprint(entity: &Entity) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entity.id.as_bytes());
    hasher.update([0u8]);
    hasher.update(entity.version.as_bytes());
    hasher.update([0u8]);
    hasher.update(entity.content.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
struct CacheEntry {
    fingerprint: String,
    outcome: Result<(), Vec<String>>,
    stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Clone)]
pub struct ValidationCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl ValidationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Cached outcome for this exact entity state, if still fresh
    pub fn get(&mut self, entity: &Entity, now: DateTime<Utc>) -> Option<Result<(), Vec<String>>> {
        let ttl = self.ttl;
        let fresh = self
            .entries
            .get(&entity.id)
            .filter(|entry| entry.fingerprint == fingerprint(entity) && now - entry.stored_at < ttl);
        match fresh {
            Some(entry) => {
                self.hits += 1;
                Some(entry.outcome.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, entity: &Entity, outcome: Result<(), Vec<String>>, now: DateTime<Utc>) {
        self.entries.insert(
            entity.id.clone(),
            CacheEntry {
                fingerprint: fingerprint(entity),
                outcome,
                stored_at: now,
            },
        );
    }

    pub fn invalidate(&mut self, id: &str) {
        self.entries.remove(id);
    }

    /// Drop entries older than the TTL
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| now - entry.stored_at < ttl);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityType;
    use serde_json::json;

    fn entity() -> Entity {
        Entity::new("a", "A", EntityType::General).with_content(json!({"k": 1}))
    }

    #[test]
    fn test_hit_within_ttl() {
        let mut cache = ValidationCache::new(Duration::seconds(300));
        let now = Utc::now();
        cache.put(&entity(), Ok(()), now);

        let hit = cache.get(&entity(), now + Duration::seconds(10));
        assert_eq!(hit, Some(Ok(())));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_miss_after_ttl() {
        let mut cache = ValidationCache::new(Duration::seconds(300));
        let now = Utc::now();
        cache.put(&entity(), Ok(()), now);

        assert_eq!(cache.get(&entity(), now + Duration::seconds(300)), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_miss_when_content_changes() {
        let mut cache = ValidationCache::new(Duration::seconds(300));
        let now = Utc::now();
        cache.put(&entity(), Err(vec!["bad".into()]), now);

        let changed = entity().with_content(json!({"k": 2}));
        assert_eq!(cache.get(&changed, now), None);
        assert_eq!(cache.get(&entity(), now), Some(Err(vec!["bad".to_string()])));
    }

    #[test]
    fn test_invalidate() {
        let mut cache = ValidationCache::new(Duration::seconds(300));
        let now = Utc::now();
        cache.put(&entity(), Ok(()), now);
        cache.invalidate("a");

        assert_eq!(cache.get(&entity(), now), None);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_purge_expired() {
        let mut cache = ValidationCache::new(Duration::seconds(1));
        let now = Utc::now();
        cache.put(&entity(), Ok(()), now);

        assert_eq!(cache.purge_expired(now), 0);
        assert_eq!(cache.purge_expired(now + Duration::seconds(5)), 1);
    }

    #[test]
    fn test_fingerprint_depends_on_version() {
        let a = entity();
        let b = entity().with_version("2.0.0");
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).len(), 64);
    }
}
