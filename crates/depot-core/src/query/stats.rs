//! Registry statistics

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::CacheStats;
use crate::store::EntityStore;
use crate::versioning::VersionStats;

/// Aggregate counts over the live entity set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    /// Uncategorised entities are not counted here
    pub by_category: BTreeMap<String, usize>,
    pub with_dependencies: usize,
    pub last_updated: Option<DateTime<Utc>>,
    /// Serialized size of every live entity
    pub storage_bytes: usize,
    pub versions: VersionStats,
    pub validation_cache: CacheStats,
}

pub fn compute_stats(store: &EntityStore, versions: VersionStats, validation_cache: CacheStats) -> Stats {
    let mut stats = Stats {
        versions,
        validation_cache,
        ..Stats::default()
    };

    for entity in store.iter() {
        stats.total += 1;
        *stats
            .by_type
            .entry(entity.entity_type.as_str().to_string())
            .or_default() += 1;
        *stats
            .by_status
            .entry(entity.status.as_str().to_string())
            .or_default() += 1;
        *stats
            .by_priority
            .entry(entity.priority.as_str().to_string())
            .or_default() += 1;
        if let Some(category) = &entity.category {
            *stats.by_category.entry(category.clone()).or_default() += 1;
        }
        if !entity.dependencies.is_empty() {
            stats.with_dependencies += 1;
        }
        stats.last_updated = stats.last_updated.max(Some(entity.updated_at));
        stats.storage_bytes += entity.approx_size();
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, EntityType, Priority};

    #[test]
    fn test_counts_by_dimension() {
        let mut store = EntityStore::new();
        store
            .insert(
                Entity::new("a", "A", EntityType::Component)
                    .with_category("input")
                    .with_priority(Priority::High),
            )
            .unwrap();
        store
            .insert(Entity::new("b", "B", EntityType::Component).with_dependencies(["a"]))
            .unwrap();
        store.insert(Entity::new("c", "C", EntityType::Theme)).unwrap();

        let stats = compute_stats(&store, VersionStats::default(), CacheStats::default());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_type["component"], 2);
        assert_eq!(stats.by_type["theme"], 1);
        assert_eq!(stats.by_status["draft"], 3);
        assert_eq!(stats.by_priority["high"], 1);
        assert_eq!(stats.by_priority["normal"], 2);
        assert_eq!(stats.by_category.len(), 1);
        assert_eq!(stats.with_dependencies, 1);
        assert!(stats.last_updated.is_some());
        assert!(stats.storage_bytes > 0);
    }

    #[test]
    fn test_empty_store() {
        let stats = compute_stats(&EntityStore::new(), VersionStats::default(), CacheStats::default());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.last_updated, None);
    }
}
