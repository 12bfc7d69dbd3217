//! Behaviour attached to entities and entity types
//!
//! `EntityHooks` travel with a single entity in its `RegistryItem`;
//! `ValidationProvider`s are registered on the engine once per entity type.
//! Both are async and may suspend; the engine awaits them in pipeline order.

use std::sync::Arc;

use async_trait::async_trait;

use crate::graph::Dependent;
use crate::model::Entity;

/// Per-entity lifecycle hooks; every method defaults to success
#[async_trait]
pub trait EntityHooks: Send + Sync {
    /// Reject the entity with one message per problem
    async fn validate(&self, _entity: &Entity) -> Result<(), Vec<String>> {
        Ok(())
    }

    /// Runs after the entity is committed; failure undoes the registration
    async fn initialize(&self, _entity: &Entity) -> Result<(), String> {
        Ok(())
    }

    /// Runs before a hard delete; failure aborts the delete
    async fn cleanup(&self, _entity: &Entity) -> Result<(), String> {
        Ok(())
    }
}

/// Hooks that accept everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl EntityHooks for NoopHooks {}

/// Validation applied to every entity of one type
#[async_trait]
pub trait ValidationProvider: Send + Sync {
    async fn validate(&self, entity: &Entity) -> Result<(), Vec<String>>;
}

/// Requires object content carrying each of the listed keys
///
/// # Example
/// ```
/// use depot_core::lifecycle::RequiredContentKeys;
///
/// let provider = RequiredContentKeys::new(["endpoint", "interval"]);
/// assert_eq!(provider.keys().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequiredContentKeys {
    keys: Vec<String>,
}

impl RequiredContentKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

#[async_trait]
impl ValidationProvider for RequiredContentKeys {
    async fn validate(&self, entity: &Entity) -> Result<(), Vec<String>> {
        let Some(object) = entity.content.as_object() else {
            return Err(vec!["content must be a JSON object".to_string()]);
        };
        let missing: Vec<String> = self
            .keys
            .iter()
            .filter(|k| !object.contains_key(k.as_str()))
            .map(|k| format!("content is missing required key '{}'", k))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

/// Rejects every entity (for exercising failure paths)
#[derive(Debug, Clone)]
pub struct RejectAllValidator {
    reason: String,
}

impl RejectAllValidator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ValidationProvider for RejectAllValidator {
    async fn validate(&self, _entity: &Entity) -> Result<(), Vec<String>> {
        Err(vec![self.reason.clone()])
    }
}

/// An entity plus the hooks that govern it
#[derive(Clone)]
pub struct RegistryItem {
    pub entity: Entity,
    pub hooks: Option<Arc<dyn EntityHooks>>,
}

impl RegistryItem {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            hooks: None,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn EntityHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn id(&self) -> &str {
        &self.entity.id
    }
}

impl From<Entity> for RegistryItem {
    fn from(entity: Entity) -> Self {
        Self::new(entity)
    }
}

impl std::fmt::Debug for RegistryItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryItem")
            .field("entity", &self.entity)
            .field("hooks", &self.hooks.as_ref().map(|_| "<hooks>"))
            .finish()
    }
}

impl Dependent for RegistryItem {
    fn dependent_id(&self) -> &str {
        &self.entity.id
    }

    fn dependency_ids(&self) -> &[String] {
        &self.entity.dependencies
    }
}

impl Dependent for Entity {
    fn dependent_id(&self) -> &str {
        &self.id
    }

    fn dependency_ids(&self) -> &[String] {
        &self.dependencies
    }
}
