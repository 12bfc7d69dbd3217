//! The registry engine
//!
//! `RegistryEngine` owns the entity store, its indexes, the dependency graph,
//! version history and the validation cache, and is the only code that
//! mutates them. Reads hand out owned copies.
//!
//! ## Logging Ownership
//!
//! Every public mutation logs:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure, followed by an `error` event
//!
//! Lower layers use only `tracing::debug!()` / `tracing::warn!()`.
//!
//! Mutations come in pairs: `try_register` returns the typed error while
//! `register` reports success as a `bool`.

mod history;
mod registration;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use depot_core_types::RequestContext;

use crate::config::EngineConfig;
use crate::errors::{DepotError, ExError, Result};
use crate::events::{EventDispatcher, RegistryEvent, SubscriptionId};
use crate::graph::{self, DependencyGraph, Dependent};
use crate::lifecycle::{EntityHooks, ValidationCache, ValidationProvider};
use crate::model::{Entity, EntityStatus, EntityType, Priority};
use crate::persistence::{EngineSnapshot, PersistenceProvider};
use crate::query::{self, QueryFilter, Stats};
use crate::store::{EntityStore, IndexKey, IndexManager};
use crate::versioning::{RetentionPolicy, VersionManager};
use crate::{log_op_end, log_op_error, log_op_start};

pub use registration::{BatchItemResult, BatchOutcome};

pub struct RegistryEngine {
    config: EngineConfig,
    store: EntityStore,
    index: IndexManager,
    graph: DependencyGraph,
    hooks: HashMap<String, Arc<dyn EntityHooks>>,
    validators: HashMap<EntityType, Arc<dyn ValidationProvider>>,
    cache: ValidationCache,
    versions: VersionManager,
    events: EventDispatcher,
    persistence: Option<Arc<dyn PersistenceProvider>>,
    context: Option<RequestContext>,
}

impl std::fmt::Debug for RegistryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEngine")
            .field("entities", &self.store.len())
            .field("validators", &self.validators.len())
            .field("persistence", &self.persistence.is_some())
            .field("events", &self.events)
            .finish()
    }
}

impl Default for RegistryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl RegistryEngine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = ValidationCache::new(config.validation_cache_ttl());
        let versions = VersionManager::new(RetentionPolicy::from(&config.retention));
        Self {
            config,
            store: EntityStore::new(),
            index: IndexManager::new(),
            graph: DependencyGraph::new(),
            hooks: HashMap::new(),
            validators: HashMap::new(),
            cache,
            versions,
            events: EventDispatcher::new(),
            persistence: None,
            context: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ===== Collaborators =====

    /// Validation applied to every entity of `entity_type`; replaces any
    /// provider already set for that type
    pub fn set_validation_provider(
        &mut self,
        entity_type: EntityType,
        provider: Arc<dyn ValidationProvider>,
    ) {
        self.validators.insert(entity_type, provider);
        self.cache.clear();
    }

    pub fn remove_validation_provider(&mut self, entity_type: EntityType) -> bool {
        let removed = self.validators.remove(&entity_type).is_some();
        if removed {
            self.cache.clear();
        }
        removed
    }

    pub fn set_persistence(&mut self, provider: Arc<dyn PersistenceProvider>) {
        self.persistence = Some(provider);
    }

    /// Replace the retention policy, e.g. to add a custom predicate
    pub fn set_retention_policy(&mut self, policy: RetentionPolicy) {
        self.versions.set_policy(policy);
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    pub fn subscribe_to<F>(&mut self, name: &'static str, handler: F) -> SubscriptionId
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.events.subscribe_to(name, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // ===== Correlation =====

    /// Run subsequent operations under `ctx`
    pub fn with_context(&mut self, ctx: RequestContext) -> &mut Self {
        self.context = Some(ctx);
        self
    }

    pub fn clear_context(&mut self) {
        self.context = None;
    }

    pub fn context(&self) -> Option<&RequestContext> {
        self.context.as_ref()
    }

    fn request_label(&self) -> &str {
        self.context
            .as_ref()
            .map_or("none", |ctx| ctx.request_id.as_str())
    }

    // ===== Reads =====

    pub fn get(&self, id: &str) -> Option<Entity> {
        self.store.get(id).ok().cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        self.store.contains(id)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Every entity, sorted by id
    pub fn list(&self) -> Vec<Entity> {
        self.store.list().into_iter().cloned().collect()
    }

    pub fn query(&self, filter: &QueryFilter) -> Vec<Entity> {
        let results = query::execute(filter, &self.store, &self.index);
        tracing::debug!(result_len = results.len(), "query executed");
        results
    }

    pub fn get_by_type(&self, entity_type: EntityType) -> Vec<Entity> {
        self.by_index(IndexKey::Type(entity_type))
    }

    pub fn get_by_category(&self, category: &str) -> Vec<Entity> {
        self.by_index(IndexKey::Category(category.to_string()))
    }

    pub fn get_by_tag(&self, tag: &str) -> Vec<Entity> {
        self.by_index(IndexKey::Tag(tag.to_string()))
    }

    pub fn get_by_status(&self, status: EntityStatus) -> Vec<Entity> {
        self.by_index(IndexKey::Status(status))
    }

    pub fn get_by_priority(&self, priority: Priority) -> Vec<Entity> {
        self.by_index(IndexKey::Priority(priority))
    }

    pub fn categories(&self) -> Vec<String> {
        self.index.categories()
    }

    pub fn tags(&self) -> Vec<String> {
        self.index.tags()
    }

    fn by_index(&self, key: IndexKey) -> Vec<Entity> {
        self.index
            .ids(&key)
            .iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    // ===== Graph reads =====

    pub fn get_dependencies(&self, id: &str, recursive: bool) -> Vec<String> {
        if recursive {
            self.graph.dependencies_recursive(id)
        } else {
            self.graph.dependencies(id)
        }
    }

    pub fn get_dependents(&self, id: &str, recursive: bool) -> Vec<String> {
        if recursive {
            self.graph.dependents_recursive(id)
        } else {
            self.graph.dependents(id)
        }
    }

    /// Order `items` so dependencies come first
    ///
    /// # Errors
    ///
    /// Returns `CycleDetected` if the items depend on each other cyclically.
    pub fn sort_by_dependencies<T: Dependent>(&self, items: Vec<T>) -> Result<Vec<T>> {
        graph::sort_by_dependencies(items)
    }

    /// Order `items` so dependents come first
    ///
    /// # Errors
    ///
    /// Returns `CycleDetected` if the items depend on each other cyclically.
    pub fn teardown_order<T: Dependent>(&self, items: Vec<T>) -> Result<Vec<T>> {
        graph::teardown_order(items)
    }

    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        self.graph.detect_cycles()
    }

    /// Every dependency that names an unregistered entity
    pub fn missing_dependencies(&self) -> Vec<DepotError> {
        self.store
            .list()
            .into_iter()
            .flat_map(|e| {
                e.dependencies
                    .iter()
                    .filter(|d| !self.store.contains(d))
                    .map(|d| DepotError::DependencyMissing {
                        entity_id: e.id.clone(),
                        dependency_id: d.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Mismatches between the store, its indexes and the graph; empty when
    /// everything agrees
    pub fn check_integrity(&self) -> Vec<String> {
        let mut problems = self.index.inconsistencies(&self.store);
        if !self.graph.is_symmetric() {
            problems.push("dependency graph is not symmetric".to_string());
        }
        for entity in self.store.iter() {
            let mut seen = HashSet::new();
            let declared: Vec<String> = entity
                .dependencies
                .iter()
                .filter(|d| seen.insert(d.as_str()))
                .cloned()
                .collect();
            if self.graph.dependencies(&entity.id) != declared {
                problems.push(format!("{} edges differ from its dependencies", entity.id));
            }
        }
        problems
    }

    // ===== Statistics and export =====

    pub fn get_stats(&self) -> Stats {
        query::compute_stats(&self.store, self.versions.stats(), self.cache.stats())
    }

    /// Metadata-only JSON document of every entity
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if encoding fails.
    pub fn export(&self) -> Result<String> {
        query::export_metadata(&self.store, Utc::now())
    }

    // ===== Whole-engine operations =====

    /// Drop every entity, edge, hook, cached result and version
    pub fn clear(&mut self) {
        log_op_start!("clear", request_id = self.request_label());
        let start = Instant::now();

        let removed = self.store.len();
        self.store.clear();
        self.index.clear();
        self.graph.clear();
        self.hooks.clear();
        self.cache.clear();
        self.versions.clear();

        log_op_end!(
            "clear",
            duration_ms = start.elapsed().as_millis() as u64,
            result_len = removed
        );
        self.events.dispatch(&RegistryEvent::Cleared { removed });
    }

    /// Snapshot the engine through the persistence provider
    ///
    /// `key` defaults to the configured `persistence_key`.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if no provider is set or the provider fails.
    pub async fn save(&self, key: Option<&str>) -> Result<()> {
        let key = key.unwrap_or(&self.config.persistence_key).to_string();
        log_op_start!("save", key = key.as_str());
        let start = Instant::now();

        let result = self.save_impl(&key).await;
        match &result {
            Ok(()) => {
                log_op_end!(
                    "save",
                    duration_ms = start.elapsed().as_millis() as u64,
                    result_len = self.store.len()
                );
            }
            Err(e) => self.report_failure("save", None, e, start),
        }
        result
    }

    async fn save_impl(&self, key: &str) -> Result<()> {
        let provider = self.provider()?;
        let entities = self.list();
        let snapshot = EngineSnapshot::new(entities, self.versions.to_archive(), Utc::now());
        provider.save(key, &snapshot).await
    }

    /// Replace the engine's contents with a saved snapshot
    ///
    /// Returns `false` if nothing was saved under the key. Hooks are not
    /// persisted; loaded entities have none until re-registered.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if no provider is set or the provider fails,
    /// and `MetadataInvalid` if a stored entity is malformed.
    pub async fn load(&mut self, key: Option<&str>) -> Result<bool> {
        let key = key.unwrap_or(&self.config.persistence_key).to_string();
        log_op_start!("load", key = key.as_str());
        let start = Instant::now();

        let result = self.load_impl(&key).await;
        match &result {
            Ok(found) => {
                log_op_end!(
                    "load",
                    duration_ms = start.elapsed().as_millis() as u64,
                    found = *found,
                    result_len = self.store.len()
                );
            }
            Err(e) => self.report_failure("load", None, e, start),
        }
        result
    }

    async fn load_impl(&mut self, key: &str) -> Result<bool> {
        let provider = self.provider()?;
        let Some(snapshot) = provider.load(key).await? else {
            return Ok(false);
        };

        let mut store = EntityStore::new();
        for entity in snapshot.entities {
            crate::lifecycle::validate_metadata(&entity)?;
            store.insert(entity)?;
        }

        let mut index = IndexManager::new();
        index.rebuild(&store);
        let mut graph = DependencyGraph::new();
        for entity in store.iter() {
            graph.set_dependencies(&entity.id, &entity.dependencies);
        }

        self.store = store;
        self.index = index;
        self.graph = graph;
        self.hooks.clear();
        self.cache.clear();
        self.versions.restore_archive(snapshot.versions);
        Ok(true)
    }

    fn provider(&self) -> Result<Arc<dyn PersistenceProvider>> {
        self.persistence
            .clone()
            .ok_or_else(|| DepotError::Persistence {
                message: "no persistence provider configured".to_string(),
            })
    }

    // ===== Shared helpers =====

    /// Log a failed operation and publish an `error` event
    fn report_failure(&self, op: &str, entity_id: Option<&str>, err: &DepotError, start: Instant) {
        let mut ex = ExError::from(err.clone()).with_op(op);
        if let Some(ctx) = &self.context {
            ex = ex.with_context(ctx);
        }
        let code = ex.code();
        log_op_error!(
            op,
            ex,
            duration_ms = start.elapsed().as_millis() as u64,
            entity_id = entity_id.unwrap_or(""),
            request_id = self.request_label()
        );
        self.events.dispatch(&RegistryEvent::Error {
            op: op.to_string(),
            entity_id: entity_id.map(str::to_string),
            code,
            message: err.to_string(),
        });
    }
}

/// A timestamp strictly after `previous`
pub(crate) fn advance(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + chrono::Duration::microseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_advance_is_strictly_increasing() {
        let t = Utc::now();
        assert!(advance(t, t) > t);
        assert!(advance(t, t - Duration::seconds(5)) > t);
        assert_eq!(advance(t, t + Duration::seconds(1)), t + Duration::seconds(1));
    }

    #[test]
    fn test_empty_engine() {
        let engine = RegistryEngine::default();
        assert!(engine.is_empty());
        assert!(engine.get("nothing").is_none());
        assert!(engine.get_dependencies("nothing", true).is_empty());
        assert!(engine.check_integrity().is_empty());
        assert_eq!(engine.get_stats().total, 0);
    }

    #[tokio::test]
    async fn test_save_without_provider_fails() {
        let engine = RegistryEngine::default();
        let result = engine.save(None).await;
        assert!(matches!(result, Err(DepotError::Persistence { .. })));
    }
}
