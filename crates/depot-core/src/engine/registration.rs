//! Registration, deletion, update and dependency edits

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{advance, RegistryEngine};
use crate::errors::{DepotError, Result};
use crate::events::RegistryEvent;
use crate::graph;
use crate::lifecycle::{run_validators, validate_metadata, EntityHooks, RegistryItem};
use crate::model::{
    deletion_outcome, ChangeType, DeleteMode, DeletionOutcome, Entity, EntityPatch, EntityStatus,
    StatusEvent,
};
use crate::{log_op_end, log_op_start};

const STATUS_EVENTS: [StatusEvent; 5] = [
    StatusEvent::Activate,
    StatusEvent::Archive,
    StatusEvent::Deprecate,
    StatusEvent::Fail,
    StatusEvent::Recover,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of `register_batch`; `details` follows registration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub success: usize,
    pub failed: usize,
    pub details: Vec<BatchItemResult>,
}

impl RegistryEngine {
    // ===== Register =====

    pub async fn register(&mut self, item: impl Into<RegistryItem>) -> bool {
        self.try_register(item).await.is_ok()
    }

    /// Validate, commit and initialize one entity
    ///
    /// A failure at any stage leaves the engine as it was.
    ///
    /// # Errors
    ///
    /// - `MetadataInvalid`: required field missing or malformed
    /// - `DuplicateId`: the id is already registered
    /// - `ValidationFailed`: the entity's hook or its type's provider rejected it
    /// - `CycleDetected`: a dependency would close a cycle
    /// - `HookFailed`: the initialize hook failed
    pub async fn try_register(&mut self, item: impl Into<RegistryItem>) -> Result<()> {
        let item = item.into();
        let id = item.entity.id.clone();
        log_op_start!(
            "register",
            entity_id = id.as_str(),
            entity_type = item.entity.entity_type.as_str(),
            request_id = self.request_label()
        );
        let start = Instant::now();

        match self.register_impl(item).await {
            Ok(entity) => {
                log_op_end!(
                    "register",
                    duration_ms = start.elapsed().as_millis() as u64,
                    entity_id = id.as_str()
                );
                self.events.dispatch(&RegistryEvent::Registered { entity });
                Ok(())
            }
            Err(e) => {
                self.report_failure("register", Some(&id), &e, start);
                Err(e)
            }
        }
    }

    async fn register_impl(&mut self, item: RegistryItem) -> Result<Entity> {
        let RegistryItem { entity, hooks } = item;

        validate_metadata(&entity)?;
        if !entity.status.is_registrable() {
            return Err(DepotError::MetadataInvalid {
                entity_id: entity.id.clone(),
                reason: format!("cannot register an entity with status {}", entity.status),
            });
        }
        if self.store.contains(&entity.id) {
            return Err(DepotError::DuplicateId {
                entity_id: entity.id.clone(),
            });
        }

        // Never answered from the cache; only a committed entity is cached.
        let now = Utc::now();
        self.cache.purge_expired(now);
        self.run_validation(&entity, hooks.as_deref())
            .await
            .map_err(|errors| DepotError::ValidationFailed {
                entity_id: entity.id.clone(),
                errors,
            })?;

        for dep in &entity.dependencies {
            if self.graph.would_create_cycle(&entity.id, dep) {
                return Err(DepotError::CycleDetected {
                    entity_id: entity.id.clone(),
                });
            }
            if !self.store.contains(dep) {
                tracing::warn!(
                    entity_id = entity.id.as_str(),
                    dependency_id = dep.as_str(),
                    "dependency not registered yet"
                );
            }
        }

        // Commit store, indexes and edges together; nothing awaits in between.
        self.index.insert(&entity);
        self.graph.set_dependencies(&entity.id, &entity.dependencies);
        self.store.insert(entity.clone())?;

        if let Some(hooks) = &hooks {
            if let Err(reason) = hooks.initialize(&entity).await {
                self.discard(&entity);
                return Err(DepotError::HookFailed {
                    entity_id: entity.id.clone(),
                    hook: "initialize".to_string(),
                    reason,
                });
            }
            self.hooks.insert(entity.id.clone(), Arc::clone(hooks));
        }
        self.cache.put(&entity, Ok(()), now);

        Ok(entity)
    }

    /// Undo the commit of a registration
    fn discard(&mut self, entity: &Entity) {
        self.store.remove(&entity.id);
        self.index.remove(entity);
        self.graph.remove_outgoing(&entity.id);
        self.cache.invalidate(&entity.id);
        self.hooks.remove(&entity.id);
    }

    /// Run validators, consulting and refreshing the cache
    async fn validate_cached(
        &mut self,
        entity: &Entity,
        hooks: Option<&dyn EntityHooks>,
    ) -> Result<()> {
        let now = Utc::now();
        let outcome = match self.cache.get(entity, now) {
            Some(outcome) => outcome,
            None => {
                let outcome = self.run_validation(entity, hooks).await;
                self.cache.put(entity, outcome.clone(), now);
                outcome
            }
        };
        outcome.map_err(|errors| DepotError::ValidationFailed {
            entity_id: entity.id.clone(),
            errors,
        })
    }

    pub(super) async fn run_validation(
        &self,
        entity: &Entity,
        hooks: Option<&dyn EntityHooks>,
    ) -> std::result::Result<(), Vec<String>> {
        let provider = self.validators.get(&entity.entity_type).cloned();
        run_validators(entity, hooks, provider.as_deref()).await
    }

    /// Validate a registered entity, using the cache when it is fresh
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` or `ValidationFailed`.
    pub async fn validate_entity(&mut self, id: &str) -> Result<()> {
        let entity = self.store.get(id)?.clone();
        let hooks = self.hooks.get(id).cloned();
        self.validate_cached(&entity, hooks.as_deref()).await
    }

    // ===== Batch =====

    /// Register `items` in dependency order
    ///
    /// Individual failures are recorded in the outcome and do not stop the
    /// batch.
    ///
    /// # Errors
    ///
    /// Returns `CycleDetected`, registering nothing, if the items depend on
    /// each other cyclically.
    pub async fn register_batch<I>(&mut self, items: Vec<I>) -> Result<BatchOutcome>
    where
        I: Into<RegistryItem>,
    {
        let items: Vec<RegistryItem> = items.into_iter().map(Into::into).collect();
        log_op_start!(
            "register_batch",
            batch_len = items.len(),
            request_id = self.request_label()
        );
        let start = Instant::now();

        let ordered = match graph::sort_by_dependencies(items) {
            Ok(ordered) => ordered,
            Err(e) => {
                let id = match &e {
                    DepotError::CycleDetected { entity_id } => Some(entity_id.clone()),
                    _ => None,
                };
                self.report_failure("register_batch", id.as_deref(), &e, start);
                return Err(e);
            }
        };

        let parent = self.context.clone();
        let mut outcome = BatchOutcome::default();
        for item in ordered {
            if let Some(ctx) = &parent {
                self.context = Some(ctx.child());
            }
            let id = item.id().to_string();
            match self.try_register(item).await {
                Ok(()) => {
                    outcome.success += 1;
                    outcome.details.push(BatchItemResult {
                        id,
                        success: true,
                        error: None,
                    });
                }
                Err(e) => {
                    outcome.failed += 1;
                    outcome.details.push(BatchItemResult {
                        id,
                        success: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        self.context = parent;

        log_op_end!(
            "register_batch",
            duration_ms = start.elapsed().as_millis() as u64,
            success = outcome.success,
            failed = outcome.failed
        );
        self.events.dispatch(&RegistryEvent::BatchComplete {
            success: outcome.success,
            failed: outcome.failed,
        });
        Ok(outcome)
    }

    // ===== Delete =====

    pub async fn unregister(&mut self, id: &str, force: bool) -> bool {
        self.try_unregister(id, force).await.is_ok()
    }

    /// Hard delete
    ///
    /// Edges from surviving dependents are left in place and show up in
    /// `missing_dependencies`.
    ///
    /// # Errors
    ///
    /// - `EntityNotFound`
    /// - `HasDependents`: registered entities depend on `id` and `force` is false
    /// - `HookFailed`: the cleanup hook failed; nothing is removed
    pub async fn try_unregister(&mut self, id: &str, force: bool) -> Result<()> {
        log_op_start!(
            "unregister",
            entity_id = id,
            force = force,
            request_id = self.request_label()
        );
        let start = Instant::now();

        match self.unregister_impl(id, force).await {
            Ok(()) => {
                log_op_end!(
                    "unregister",
                    duration_ms = start.elapsed().as_millis() as u64,
                    entity_id = id
                );
                self.events.dispatch(&RegistryEvent::Unregistered {
                    entity_id: id.to_string(),
                    mode: DeleteMode::Hard,
                });
                Ok(())
            }
            Err(e) => {
                self.report_failure("unregister", Some(id), &e, start);
                Err(e)
            }
        }
    }

    async fn unregister_impl(&mut self, id: &str, force: bool) -> Result<()> {
        let entity = self.store.get(id)?.clone();

        let dependents: Vec<String> = self
            .graph
            .dependents(id)
            .into_iter()
            .filter(|d| self.store.contains(d))
            .collect();
        if !dependents.is_empty() {
            if !force {
                return Err(DepotError::HasDependents {
                    entity_id: id.to_string(),
                    dependents,
                });
            }
            tracing::warn!(entity_id = id, ?dependents, "forced delete leaves dangling dependencies");
        }

        if let Some(hooks) = self.hooks.get(id).cloned() {
            hooks
                .cleanup(&entity)
                .await
                .map_err(|reason| DepotError::HookFailed {
                    entity_id: id.to_string(),
                    hook: "cleanup".to_string(),
                    reason,
                })?;
        }

        if deletion_outcome(entity.status, DeleteMode::Hard) == DeletionOutcome::Removed {
            self.discard(&entity);
            self.versions.remove_entity(id);
        }
        Ok(())
    }

    pub async fn deprecate(&mut self, id: &str) -> bool {
        self.try_deprecate(id).await.is_ok()
    }

    /// Soft delete: keep the record, move it to Deprecated
    ///
    /// Allowed even when other entities depend on it.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound`.
    pub async fn try_deprecate(&mut self, id: &str) -> Result<()> {
        log_op_start!("deprecate", entity_id = id, request_id = self.request_label());
        let start = Instant::now();

        match self.deprecate_impl(id) {
            Ok(()) => {
                log_op_end!(
                    "deprecate",
                    duration_ms = start.elapsed().as_millis() as u64,
                    entity_id = id
                );
                self.events.dispatch(&RegistryEvent::Unregistered {
                    entity_id: id.to_string(),
                    mode: DeleteMode::Soft,
                });
                Ok(())
            }
            Err(e) => {
                self.report_failure("deprecate", Some(id), &e, start);
                Err(e)
            }
        }
    }

    fn deprecate_impl(&mut self, id: &str) -> Result<()> {
        let before = self.store.get(id)?.clone();
        let DeletionOutcome::Retained(status) = deletion_outcome(before.status, DeleteMode::Soft)
        else {
            return Ok(());
        };

        let mut after = before.clone();
        after.status = status;
        after.updated_at = advance(before.updated_at, Utc::now());
        self.commit_replace(&before, after)?;

        if self.config.auto_version_on_update {
            let author = self.config.auto_version_author.clone();
            self.ensure_baseline(&before, &author)?;
            self.record_version(id, "Deprecated", ChangeType::Patch, &author)?;
        }
        Ok(())
    }

    // ===== Status =====

    /// Apply a lifecycle event to an entity's status
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound`, or `MetadataInvalid` if the event is not
    /// legal from the current status.
    pub fn transition(&mut self, id: &str, event: StatusEvent) -> Result<EntityStatus> {
        log_op_start!("transition", entity_id = id, request_id = self.request_label());
        let start = Instant::now();

        match self.transition_impl(id, event) {
            Ok(entity) => {
                log_op_end!(
                    "transition",
                    duration_ms = start.elapsed().as_millis() as u64,
                    entity_id = id,
                    status = entity.status.as_str()
                );
                let status = entity.status;
                self.events.dispatch(&RegistryEvent::Changed { entity });
                Ok(status)
            }
            Err(e) => {
                self.report_failure("transition", Some(id), &e, start);
                Err(e)
            }
        }
    }

    fn transition_impl(&mut self, id: &str, event: StatusEvent) -> Result<Entity> {
        let before = self.store.get(id)?.clone();
        let status = before
            .status
            .transition(event)
            .ok_or_else(|| DepotError::MetadataInvalid {
                entity_id: id.to_string(),
                reason: format!("{:?} is not allowed from {}", event, before.status),
            })?;

        let mut after = before.clone();
        after.status = status;
        after.updated_at = advance(before.updated_at, Utc::now());
        self.commit_replace(&before, after.clone())?;
        Ok(after)
    }

    /// Swap in a new state for an existing entity, keeping indexes current
    pub(super) fn commit_replace(&mut self, before: &Entity, after: Entity) -> Result<()> {
        self.index.reindex(before, &after);
        self.cache.invalidate(&before.id);
        self.store.replace(after)?;
        Ok(())
    }

    // ===== Update =====

    pub async fn update(&mut self, id: &str, patch: EntityPatch) -> bool {
        self.try_update(id, patch).await.is_ok()
    }

    /// Merge `patch` into an entity and re-validate it
    ///
    /// If validation rejects the merged state the entity keeps its previous
    /// content and its status moves to Error.
    ///
    /// # Errors
    ///
    /// - `EntityNotFound`
    /// - `MetadataInvalid`: the merged entity is malformed, or the patch asks
    ///   for a status the current one cannot reach
    /// - `CycleDetected`: new dependencies would close a cycle
    /// - `ValidationFailed`
    pub async fn try_update(&mut self, id: &str, patch: EntityPatch) -> Result<Entity> {
        log_op_start!("update", entity_id = id, request_id = self.request_label());
        let start = Instant::now();

        match self.update_impl(id, patch).await {
            Ok(entity) => {
                log_op_end!(
                    "update",
                    duration_ms = start.elapsed().as_millis() as u64,
                    entity_id = id,
                    version = entity.version.as_str()
                );
                self.events.dispatch(&RegistryEvent::Changed {
                    entity: entity.clone(),
                });
                Ok(entity)
            }
            Err(e) => {
                self.report_failure("update", Some(id), &e, start);
                Err(e)
            }
        }
    }

    async fn update_impl(&mut self, id: &str, patch: EntityPatch) -> Result<Entity> {
        let before = self.store.get(id)?.clone();

        let mut after = before.clone();
        after.apply_patch(&patch);
        after.updated_at = advance(before.updated_at, Utc::now());
        validate_metadata(&after)?;

        if after.status != before.status
            && !STATUS_EVENTS
                .iter()
                .any(|e| before.status.transition(*e) == Some(after.status))
        {
            return Err(DepotError::MetadataInvalid {
                entity_id: id.to_string(),
                reason: format!("status cannot move from {} to {}", before.status, after.status),
            });
        }

        let deps_changed = after.dependencies != before.dependencies;
        if deps_changed {
            // Any path back to `id` reaches it before using its own edges, so
            // the current graph answers the question for the new edge set.
            if let Some(dep) = after
                .dependencies
                .iter()
                .find(|dep| self.graph.would_create_cycle(id, dep))
            {
                tracing::debug!(entity_id = id, dependency_id = dep.as_str(), "update would close a cycle");
                return Err(DepotError::CycleDetected {
                    entity_id: id.to_string(),
                });
            }
        }

        self.cache.invalidate(id);
        let hooks = self.hooks.get(id).cloned();
        let outcome = self.run_validation(&after, hooks.as_deref()).await;
        if let Err(errors) = outcome {
            self.mark_failed(&before);
            return Err(DepotError::ValidationFailed {
                entity_id: id.to_string(),
                errors,
            });
        }

        let new_deps = after.dependencies.clone();
        self.commit_replace(&before, after)?;
        if deps_changed {
            self.graph.set_dependencies(id, &new_deps);
        }

        if self.config.auto_version_on_update {
            let author = self.config.auto_version_author.clone();
            self.ensure_baseline(&before, &author)?;
            let changelog = describe_patch(&patch);
            self.record_version(id, &changelog, ChangeType::Patch, &author)?;
        }

        let updated = self.store.get(id)?.clone();
        self.cache.put(&updated, Ok(()), Utc::now());
        Ok(updated)
    }

    /// Move an entity to Error after a failed re-validation
    fn mark_failed(&mut self, before: &Entity) {
        let Some(status) = before.status.transition(StatusEvent::Fail) else {
            return;
        };
        if status == before.status {
            return;
        }
        let mut failed = before.clone();
        failed.status = status;
        failed.updated_at = advance(before.updated_at, Utc::now());
        if self.commit_replace(before, failed.clone()).is_ok() {
            self.events.dispatch(&RegistryEvent::Changed { entity: failed });
        }
    }

    // ===== Revalidation =====

    /// Re-run validation for every entity
    ///
    /// Active entities that now fail move to Error; Error entities that now
    /// pass recover to Active. Returns the ids that fail, sorted.
    pub async fn revalidate_all(&mut self) -> Vec<String> {
        log_op_start!(
            "revalidate_all",
            batch_len = self.store.len(),
            request_id = self.request_label()
        );
        let start = Instant::now();

        let now = Utc::now();
        let purged = self.cache.purge_expired(now);
        tracing::debug!(purged, "expired validation results dropped");
        let mut failing = Vec::new();
        let entities: Vec<Entity> = self.list();
        for entity in entities {
            let hooks = self.hooks.get(&entity.id).cloned();
            let outcome = self.run_validation(&entity, hooks.as_deref()).await;
            self.cache.put(&entity, outcome.clone(), now);

            match outcome {
                Err(errors) => {
                    tracing::debug!(entity_id = entity.id.as_str(), ?errors, "entity failed validation");
                    if entity.status == EntityStatus::Active {
                        self.mark_failed(&entity);
                    }
                    failing.push(entity.id.clone());
                }
                Ok(()) if entity.status == EntityStatus::Error => {
                    if let Some(status) = entity.status.transition(StatusEvent::Recover) {
                        let mut recovered = entity.clone();
                        recovered.status = status;
                        recovered.updated_at = advance(entity.updated_at, now);
                        if self.commit_replace(&entity, recovered.clone()).is_ok() {
                            self.cache.put(&recovered, Ok(()), now);
                            self.events
                                .dispatch(&RegistryEvent::Changed { entity: recovered });
                        }
                    }
                }
                Ok(()) => {}
            }
        }

        for missing in self.missing_dependencies() {
            tracing::warn!(error = %missing, "dangling dependency");
        }

        log_op_end!(
            "revalidate_all",
            duration_ms = start.elapsed().as_millis() as u64,
            result_len = failing.len()
        );
        if !failing.is_empty() {
            self.events.dispatch(&RegistryEvent::ValidationFailed {
                entity_ids: failing.clone(),
            });
        }
        failing
    }

    // ===== Dependency edits =====

    /// Make `id` depend on `dependency`
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if `id` is not registered and
    /// `CycleDetected` if the edge would close a cycle.
    pub fn add_dependency(&mut self, id: &str, dependency: &str) -> Result<()> {
        log_op_start!(
            "add_dependency",
            entity_id = id,
            dependency_id = dependency,
            request_id = self.request_label()
        );
        let start = Instant::now();

        match self.add_dependency_impl(id, dependency) {
            Ok(Some(entity)) => {
                log_op_end!(
                    "add_dependency",
                    duration_ms = start.elapsed().as_millis() as u64,
                    entity_id = id
                );
                self.events.dispatch(&RegistryEvent::Changed { entity });
                Ok(())
            }
            Ok(None) => {
                log_op_end!(
                    "add_dependency",
                    duration_ms = start.elapsed().as_millis() as u64,
                    entity_id = id,
                    unchanged = true
                );
                Ok(())
            }
            Err(e) => {
                self.report_failure("add_dependency", Some(id), &e, start);
                Err(e)
            }
        }
    }

    fn add_dependency_impl(&mut self, id: &str, dependency: &str) -> Result<Option<Entity>> {
        let before = self.store.get(id)?.clone();
        if before.depends_on(dependency) {
            return Ok(None);
        }
        if self.graph.would_create_cycle(id, dependency) {
            return Err(DepotError::CycleDetected {
                entity_id: id.to_string(),
            });
        }
        if !self.store.contains(dependency) {
            tracing::warn!(entity_id = id, dependency_id = dependency, "dependency not registered yet");
        }

        let mut after = before.clone();
        after.dependencies.push(dependency.to_string());
        after.updated_at = advance(before.updated_at, Utc::now());
        self.commit_replace(&before, after.clone())?;
        self.graph.add_edge(id, dependency);
        Ok(Some(after))
    }

    /// Drop the edge `id -> dependency`; returns whether it existed
    pub fn remove_dependency(&mut self, id: &str, dependency: &str) -> bool {
        log_op_start!(
            "remove_dependency",
            entity_id = id,
            dependency_id = dependency,
            request_id = self.request_label()
        );
        let start = Instant::now();

        let before = self
            .store
            .get(id)
            .ok()
            .filter(|e| e.depends_on(dependency))
            .cloned();
        let removed = before.and_then(|before| {
            let mut after = before.clone();
            after.dependencies.retain(|d| d != dependency);
            after.updated_at = advance(before.updated_at, Utc::now());
            self.graph.remove_edge(id, dependency);
            self.commit_replace(&before, after.clone()).ok().map(|()| after)
        });

        log_op_end!(
            "remove_dependency",
            duration_ms = start.elapsed().as_millis() as u64,
            entity_id = id,
            removed = removed.is_some()
        );
        match removed {
            Some(entity) => {
                self.events.dispatch(&RegistryEvent::Changed { entity });
                true
            }
            None => false,
        }
    }
}

/// Changelog line naming the fields a patch touched
fn describe_patch(patch: &EntityPatch) -> String {
    let mut fields = Vec::new();
    if patch.name.is_some() {
        fields.push("name");
    }
    if patch.status.is_some() {
        fields.push("status");
    }
    if patch.priority.is_some() {
        fields.push("priority");
    }
    if patch.category.is_some() {
        fields.push("category");
    }
    if patch.tags.is_some() {
        fields.push("tags");
    }
    if patch.dependencies.is_some() {
        fields.push("dependencies");
    }
    if patch.description.is_some() {
        fields.push("description");
    }
    if patch.author.is_some() {
        fields.push("author");
    }
    if patch.content.is_some() {
        fields.push("content");
    }
    if fields.is_empty() {
        "Touched".to_string()
    } else {
        format!("Updated {}", fields.join(", "))
    }
}
