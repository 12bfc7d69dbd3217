//! Secondary indexes over the entity store
//!
//! One map from `IndexKey` to the set of ids whose entity currently has that
//! value. Buckets are dropped as soon as they empty, so a key is present iff
//! at least one live entity matches it.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::model::{Entity, EntityStatus, EntityType, Priority};
use crate::store::EntityStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Type(EntityType),
    Category(String),
    Tag(String),
    Status(EntityStatus),
    Priority(Priority),
}

impl IndexKey {
    /// Every key an entity belongs under
    pub fn keys_for(entity: &Entity) -> HashSet<IndexKey> {
        let mut keys = HashSet::with_capacity(4 + entity.tags.len());
        keys.insert(IndexKey::Type(entity.entity_type));
        keys.insert(IndexKey::Status(entity.status));
        keys.insert(IndexKey::Priority(entity.priority));
        if let Some(category) = &entity.category {
            keys.insert(IndexKey::Category(category.clone()));
        }
        for tag in &entity.tags {
            keys.insert(IndexKey::Tag(tag.clone()));
        }
        keys
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    buckets: HashMap<IndexKey, BTreeSet<String>>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: &Entity) {
        for key in IndexKey::keys_for(entity) {
            self.add(key, &entity.id);
        }
    }

    pub fn remove(&mut self, entity: &Entity) {
        for key in IndexKey::keys_for(entity) {
            self.drop_id(&key, &entity.id);
        }
    }

    /// Move an entity between buckets, touching only keys that changed
    pub fn reindex(&mut self, before: &Entity, after: &Entity) {
        if before.id != after.id {
            self.remove(before);
            self.insert(after);
            return;
        }
        let old_keys = IndexKey::keys_for(before);
        let new_keys = IndexKey::keys_for(after);
        for key in old_keys.difference(&new_keys) {
            self.drop_id(key, &before.id);
        }
        for key in new_keys.difference(&old_keys) {
            self.add(key.clone(), &after.id);
        }
    }

    /// Ids under a key, empty if none
    pub fn ids(&self, key: &IndexKey) -> Vec<String> {
        self.buckets
            .get(key)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &IndexKey, id: &str) -> bool {
        self.buckets.get(key).is_some_and(|ids| ids.contains(id))
    }

    pub fn bucket_len(&self, key: &IndexKey) -> usize {
        self.buckets.get(key).map_or(0, BTreeSet::len)
    }

    /// Distinct categories currently indexed
    pub fn categories(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .buckets
            .keys()
            .filter_map(|k| match k {
                IndexKey::Category(c) => Some(c.clone()),
                _ => None,
            })
            .collect();
        out.sort();
        out
    }

    /// Distinct tags currently indexed
    pub fn tags(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .buckets
            .keys()
            .filter_map(|k| match k {
                IndexKey::Tag(t) => Some(t.clone()),
                _ => None,
            })
            .collect();
        out.sort();
        out
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Rebuild every bucket from the store
    pub fn rebuild(&mut self, store: &EntityStore) {
        self.buckets.clear();
        for entity in store.iter() {
            self.insert(entity);
        }
    }

    /// Describe every mismatch between the indexes and the store
    ///
    /// Empty when each id sits in exactly the buckets its entity's fields
    /// name and nowhere else.
    pub fn inconsistencies(&self, store: &EntityStore) -> Vec<String> {
        let mut problems = Vec::new();
        for entity in store.iter() {
            for key in IndexKey::keys_for(entity) {
                if !self.contains(&key, &entity.id) {
                    problems.push(format!("{} missing from {:?}", entity.id, key));
                }
            }
        }
        for (key, ids) in &self.buckets {
            if ids.is_empty() {
                problems.push(format!("empty bucket {:?}", key));
            }
            for id in ids {
                let matches = store
                    .get(id)
                    .map(|e| IndexKey::keys_for(e).contains(key))
                    .unwrap_or(false);
                if !matches {
                    problems.push(format!("stale {} in {:?}", id, key));
                }
            }
        }
        problems
    }

    fn add(&mut self, key: IndexKey, id: &str) {
        self.buckets.entry(key).or_default().insert(id.to_string());
    }

    fn drop_id(&mut self, key: &IndexKey, id: &str) {
        if let Some(ids) = self.buckets.get_mut(key) {
            ids.remove(id);
            if ids.is_empty() {
                self.buckets.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(id: &str) -> Entity {
        Entity::new(id, id, EntityType::Component)
            .with_category("ui")
            .with_tags(["blue", "small"])
    }

    #[test]
    fn test_insert_populates_every_dimension() {
        let mut index = IndexManager::new();
        let e = widget("w1");
        index.insert(&e);

        assert!(index.contains(&IndexKey::Type(EntityType::Component), "w1"));
        assert!(index.contains(&IndexKey::Category("ui".into()), "w1"));
        assert!(index.contains(&IndexKey::Tag("blue".into()), "w1"));
        assert!(index.contains(&IndexKey::Status(EntityStatus::Draft), "w1"));
        assert!(index.contains(&IndexKey::Priority(Priority::Normal), "w1"));
    }

    #[test]
    fn test_remove_prunes_empty_buckets() {
        let mut index = IndexManager::new();
        let e = widget("w1");
        index.insert(&e);
        index.remove(&e);

        assert_eq!(index.bucket_len(&IndexKey::Tag("blue".into())), 0);
        assert!(index.categories().is_empty());
        assert!(index.tags().is_empty());
    }

    #[test]
    fn test_reindex_moves_changed_keys_only() {
        let mut index = IndexManager::new();
        let before = widget("w1");
        index.insert(&before);
        index.insert(&widget("w2"));

        let after = before
            .clone()
            .with_tags(["red", "small"])
            .with_status(EntityStatus::Active);
        index.reindex(&before, &after);

        assert!(!index.contains(&IndexKey::Tag("blue".into()), "w1"));
        assert!(index.contains(&IndexKey::Tag("blue".into()), "w2"));
        assert!(index.contains(&IndexKey::Tag("red".into()), "w1"));
        assert!(index.contains(&IndexKey::Tag("small".into()), "w1"));
        assert!(index.contains(&IndexKey::Status(EntityStatus::Active), "w1"));
        assert!(!index.contains(&IndexKey::Status(EntityStatus::Draft), "w1"));
    }

    #[test]
    fn test_inconsistencies_detects_stale_entry() {
        let mut store = EntityStore::new();
        let mut index = IndexManager::new();
        let e = widget("w1");
        store.insert(e.clone()).unwrap();
        index.insert(&e);
        assert!(index.inconsistencies(&store).is_empty());

        store.remove("w1");
        assert!(!index.inconsistencies(&store).is_empty());

        index.rebuild(&store);
        assert!(index.inconsistencies(&store).is_empty());
    }
}
