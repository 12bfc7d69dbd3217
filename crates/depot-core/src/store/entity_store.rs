use std::collections::HashMap;

use crate::errors::{DepotError, Result};
use crate::model::Entity;

/// Canonical id → entity map
///
/// Not thread-safe; the engine owns it exclusively and hands out clones.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    pub(crate) entities: HashMap<String, Entity>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an entity by id
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if no entity has this id.
    pub fn get(&self, id: &str) -> Result<&Entity> {
        self.entities
            .get(id)
            .ok_or_else(|| DepotError::EntityNotFound {
                entity_id: id.to_string(),
            })
    }

    /// Get a mutable reference to an entity by id
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if no entity has this id.
    pub fn get_mut(&mut self, id: &str) -> Result<&mut Entity> {
        self.entities
            .get_mut(id)
            .ok_or_else(|| DepotError::EntityNotFound {
                entity_id: id.to_string(),
            })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Insert a new entity
    ///
    /// # Errors
    ///
    /// Returns `DuplicateId` if the id is taken; the store is unchanged.
    pub fn insert(&mut self, entity: Entity) -> Result<()> {
        if self.entities.contains_key(&entity.id) {
            return Err(DepotError::DuplicateId {
                entity_id: entity.id,
            });
        }
        self.entities.insert(entity.id.clone(), entity);
        Ok(())
    }

    /// Overwrite an existing entity, returning the previous value
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the id is not present.
    pub fn replace(&mut self, entity: Entity) -> Result<Entity> {
        let slot = self.get_mut(&entity.id)?;
        Ok(std::mem::replace(slot, entity))
    }

    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        self.entities.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// All entities ordered by id
    pub fn list(&self) -> Vec<&Entity> {
        let mut all: Vec<&Entity> = self.entities.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}
