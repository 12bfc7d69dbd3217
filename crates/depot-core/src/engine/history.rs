//! Version history operations

use std::time::Instant;

use chrono::Utc;

use super::{advance, RegistryEngine};
use crate::errors::{DepotError, Result};
use crate::events::RegistryEvent;
use crate::lifecycle::validate_metadata;
use crate::model::{ChangeType, Entity, VersionSnapshot};
use crate::versioning::{HistoryOptions, RollbackOptions, VersionComparison, VersionStats};
use crate::{log_op_end, log_op_start};

impl RegistryEngine {
    /// Record the entity's current state; returns the new version string
    pub fn create_version(
        &mut self,
        id: &str,
        changelog: &str,
        change_type: ChangeType,
        author: &str,
    ) -> Option<String> {
        self.try_create_version(id, changelog, change_type, author)
            .ok()
            .map(|snapshot| snapshot.version)
    }

    /// # Errors
    ///
    /// Returns `EntityNotFound`, or `MetadataInvalid` if the latest recorded
    /// version does not parse.
    pub fn try_create_version(
        &mut self,
        id: &str,
        changelog: &str,
        change_type: ChangeType,
        author: &str,
    ) -> Result<VersionSnapshot> {
        log_op_start!("create_version", entity_id = id, request_id = self.request_label());
        let start = Instant::now();

        match self.record_version(id, changelog, change_type, author) {
            Ok(snapshot) => {
                log_op_end!(
                    "create_version",
                    duration_ms = start.elapsed().as_millis() as u64,
                    entity_id = id,
                    version = snapshot.version.as_str()
                );
                Ok(snapshot)
            }
            Err(e) => {
                self.report_failure("create_version", Some(id), &e, start);
                Err(e)
            }
        }
    }

    /// Snapshot the live entity and stamp it with the new version
    pub(super) fn record_version(
        &mut self,
        id: &str,
        changelog: &str,
        change_type: ChangeType,
        author: &str,
    ) -> Result<VersionSnapshot> {
        let live = self.store.get(id)?.clone();
        let snapshot = self
            .versions
            .record(&live, changelog, change_type, author, Utc::now())?;

        if let Ok(entity) = self.store.get_mut(id) {
            entity.version = snapshot.version.clone();
        }
        self.events.dispatch(&RegistryEvent::VersionCreated {
            entity_id: id.to_string(),
            version: snapshot.version.clone(),
            change_type,
        });
        Ok(snapshot)
    }

    /// Before the first automatic version, record the state being replaced
    pub(super) fn ensure_baseline(&mut self, before: &Entity, author: &str) -> Result<()> {
        if self.versions.version_count(&before.id) > 0 {
            return Ok(());
        }
        let snapshot =
            self.versions
                .record_baseline(before, "Initial version", author, Utc::now())?;
        self.events.dispatch(&RegistryEvent::VersionCreated {
            entity_id: before.id.clone(),
            version: snapshot.version,
            change_type: ChangeType::Major,
        });
        Ok(())
    }

    pub async fn rollback_to_version(
        &mut self,
        id: &str,
        version: &str,
        options: RollbackOptions,
    ) -> Option<Entity> {
        self.try_rollback_to_version(id, version, options).await.ok()
    }

    /// Restore the content of a recorded version
    ///
    /// The restored state is validated first; `force` skips that check.
    /// The rollback itself is recorded as a new patch version.
    ///
    /// # Errors
    ///
    /// - `EntityNotFound`
    /// - `VersionNotFound`
    /// - `RollbackFailed`: the restored state does not validate
    pub async fn try_rollback_to_version(
        &mut self,
        id: &str,
        version: &str,
        options: RollbackOptions,
    ) -> Result<Entity> {
        log_op_start!(
            "rollback_to_version",
            entity_id = id,
            version = version,
            request_id = self.request_label()
        );
        let start = Instant::now();

        match self.rollback_impl(id, version, options).await {
            Ok((entity, new_version)) => {
                log_op_end!(
                    "rollback_to_version",
                    duration_ms = start.elapsed().as_millis() as u64,
                    entity_id = id,
                    version = new_version.as_str()
                );
                self.events.dispatch(&RegistryEvent::VersionRollback {
                    entity_id: id.to_string(),
                    target_version: version.to_string(),
                    new_version,
                });
                Ok(entity)
            }
            Err(e) => {
                self.report_failure("rollback_to_version", Some(id), &e, start);
                Err(e)
            }
        }
    }

    async fn rollback_impl(
        &mut self,
        id: &str,
        version: &str,
        options: RollbackOptions,
    ) -> Result<(Entity, String)> {
        let current = self.store.get(id)?.clone();
        let target = self.versions.require(id, version)?.clone();

        let mut restored = current.clone();
        restored.content = target.entity.content.clone();
        restored.updated_at = advance(current.updated_at, Utc::now());

        let rollback_failed = |reason: String| DepotError::RollbackFailed {
            entity_id: id.to_string(),
            version: version.to_string(),
            reason,
        };
        if !options.force {
            validate_metadata(&restored).map_err(|e| rollback_failed(e.to_string()))?;
            let hooks = self.hooks.get(id).cloned();
            self.run_validation(&restored, hooks.as_deref())
                .await
                .map_err(|errors| rollback_failed(errors.join("; ")))?;
        }

        let operator = options
            .operator
            .clone()
            .unwrap_or_else(|| self.config.auto_version_author.clone());

        if options.create_backup {
            self.record_version(
                id,
                &format!("Backup before rollback to {}", version),
                ChangeType::Patch,
                &operator,
            )?;
        }

        self.commit_replace(&current, restored)?;
        let reason = options.reason.as_deref().unwrap_or("no reason given");
        let snapshot = self.record_version(
            id,
            &format!("Rolled back to {}: {}", version, reason),
            ChangeType::Patch,
            &operator,
        )?;
        self.versions.note_rollback();

        let entity = self.store.get(id)?.clone();
        Ok((entity, snapshot.version))
    }

    /// Recorded versions, newest first unless `options.order` says otherwise
    pub fn get_version_history(&self, id: &str, options: &HistoryOptions) -> Vec<VersionSnapshot> {
        self.versions.history(id, options)
    }

    pub fn get_version(&self, id: &str, version: &str) -> Option<VersionSnapshot> {
        self.versions.get(id, version).cloned()
    }

    pub fn latest_version(&self, id: &str) -> Option<VersionSnapshot> {
        self.versions.latest(id).cloned()
    }

    /// Attach a named tag to a version
    ///
    /// # Errors
    ///
    /// Returns `VersionNotFound` if the entity has no such version.
    pub fn tag_version(&mut self, id: &str, version: &str, tag: &str) -> Result<()> {
        self.versions.tag(id, version, tag)
    }

    pub fn get_version_by_tag(&self, id: &str, tag: &str) -> Option<VersionSnapshot> {
        self.versions.by_tag(id, tag).cloned()
    }

    pub fn version_tags(&self, id: &str, version: &str) -> Vec<String> {
        self.versions.tags_for(id, version)
    }

    /// Field-level diff between two recorded versions
    pub fn compare_versions(&self, id: &str, from: &str, to: &str) -> Option<VersionComparison> {
        self.try_compare_versions(id, from, to).ok()
    }

    /// # Errors
    ///
    /// Returns `VersionNotFound` if either version is missing.
    pub fn try_compare_versions(&self, id: &str, from: &str, to: &str) -> Result<VersionComparison> {
        self.versions.compare(id, from, to)
    }

    /// Apply the retention policy to every history; returns how many
    /// versions were removed
    pub fn apply_retention(&mut self) -> usize {
        log_op_start!("apply_retention", request_id = self.request_label());
        let start = Instant::now();
        let removed = self.versions.apply_retention(Utc::now());
        log_op_end!(
            "apply_retention",
            duration_ms = start.elapsed().as_millis() as u64,
            result_len = removed
        );
        removed
    }

    pub fn version_stats(&self) -> VersionStats {
        self.versions.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityType;
    use serde_json::json;

    async fn engine_with(entity: Entity) -> RegistryEngine {
        let mut engine = RegistryEngine::default();
        engine.try_register(entity).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn test_create_version_sets_live_version() {
        let mut engine = engine_with(Entity::new("cfg", "Config", EntityType::System)).await;
        assert_eq!(
            engine.create_version("cfg", "init", ChangeType::Major, "bob"),
            Some("1.0.0".to_string())
        );
        assert_eq!(
            engine.create_version("cfg", "more", ChangeType::Minor, "bob"),
            Some("1.1.0".to_string())
        );
        assert_eq!(engine.get("cfg").unwrap().version, "1.1.0");
        assert_eq!(engine.create_version("ghost", "x", ChangeType::Patch, "bob"), None);
    }

    #[tokio::test]
    async fn test_rollback_with_backup() {
        let mut engine = engine_with(
            Entity::new("cfg", "Config", EntityType::System).with_content(json!({"n": 1})),
        )
        .await;
        engine.create_version("cfg", "init", ChangeType::Major, "bob");
        engine
            .try_update("cfg", crate::model::EntityPatch::new().content(json!({"n": 2})))
            .await
            .unwrap();

        let restored = engine
            .try_rollback_to_version(
                "cfg",
                "1.0.0",
                RollbackOptions {
                    create_backup: true,
                    operator: Some("ops".to_string()),
                    reason: Some("bad deploy".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(restored.content, json!({"n": 1}));
        let history = engine.get_version_history("cfg", &HistoryOptions::default());
        // 1.0.0 init, 1.0.1 update, 1.0.2 backup, 1.0.3 rollback
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].version, "1.0.3");
        assert_eq!(history[0].changelog, "Rolled back to 1.0.0: bad deploy");
        assert_eq!(history[0].author, "ops");
        assert_eq!(history[1].entity.content, json!({"n": 2}));
        assert_eq!(engine.version_stats().total_rollbacks, 1);
    }

    #[tokio::test]
    async fn test_tags() {
        let mut engine = engine_with(Entity::new("cfg", "Config", EntityType::System)).await;
        engine.create_version("cfg", "init", ChangeType::Major, "bob");
        engine.tag_version("cfg", "1.0.0", "stable").unwrap();

        assert_eq!(
            engine.get_version_by_tag("cfg", "stable").map(|s| s.version),
            Some("1.0.0".to_string())
        );
        assert_eq!(engine.version_tags("cfg", "1.0.0"), vec!["stable".to_string()]);
        assert!(matches!(
            engine.tag_version("cfg", "9.9.9", "nope"),
            Err(DepotError::VersionNotFound { .. })
        ));
    }
}
