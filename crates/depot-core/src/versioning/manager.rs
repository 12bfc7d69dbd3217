//! Per-entity version history
//!
//! Histories are append-only lists in creation order. Snapshots are never
//! edited; tags live in a separate map, and only retention removes entries.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{DepotError, Result};
use crate::model::{ChangeType, Entity, SemVer, VersionSnapshot};
use crate::versioning::diff::{compare_snapshots, VersionComparison};
use crate::versioning::retention::RetentionPolicy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filters for `history`
#[derive(Debug, Clone, Default)]
pub struct HistoryOptions {
    pub limit: Option<usize>,
    pub offset: usize,
    pub order: SortOrder,
    /// Only these change types; `None` means all
    pub change_types: Option<Vec<ChangeType>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct RollbackOptions {
    /// Record the live state as a version before rolling back
    pub create_backup: bool,
    /// Roll back even if the restored state fails validation
    pub force: bool,
    pub operator: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStats {
    pub total_versions: usize,
    pub entities_with_history: usize,
    pub total_rollbacks: u64,
    pub removed_by_retention: u64,
    pub tagged_versions: usize,
    /// Serialized size of every snapshot
    pub storage_bytes: usize,
}

/// Serializable history state, used by persistence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionArchive {
    pub histories: BTreeMap<String, Vec<VersionSnapshot>>,
    pub tags: BTreeMap<String, BTreeMap<String, String>>,
    pub total_rollbacks: u64,
}

#[derive(Debug, Clone, Default)]
pub struct VersionManager {
    histories: HashMap<String, Vec<VersionSnapshot>>,
    /// entity id -> tag -> version
    tags: HashMap<String, BTreeMap<String, String>>,
    policy: RetentionPolicy,
    total_rollbacks: u64,
    removed_by_retention: u64,
}

impl VersionManager {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: RetentionPolicy) {
        self.policy = policy;
    }

    pub fn latest(&self, id: &str) -> Option<&VersionSnapshot> {
        self.histories.get(id).and_then(|h| h.last())
    }

    /// Version the next record of `change_type` would get
    ///
    /// With no history this is `1.0.0` whatever the change type.
    ///
    /// # Errors
    ///
    /// Returns `MetadataInvalid` if the latest recorded version does not
    /// parse.
    pub fn next_version(&self, id: &str, change_type: ChangeType) -> Result<SemVer> {
        match self.latest(id) {
            None => Ok(SemVer::INITIAL),
            Some(latest) => {
                let current: SemVer =
                    latest
                        .version
                        .parse()
                        .map_err(|reason| DepotError::MetadataInvalid {
                            entity_id: id.to_string(),
                            reason,
                        })?;
                Ok(current.bump(change_type))
            }
        }
    }

    /// Append a snapshot of `entity` and apply retention to its history
    ///
    /// The stored copy carries the new version string.
    ///
    /// # Errors
    ///
    /// Returns `MetadataInvalid` if the previous version does not parse.
    pub fn record(
        &mut self,
        entity: &Entity,
        changelog: impl Into<String>,
        change_type: ChangeType,
        author: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<VersionSnapshot> {
        let version = self.next_version(&entity.id, change_type)?.to_string();
        Ok(self.push(entity, version, changelog.into(), change_type, author.into(), now))
    }

    /// Start a history at the entity's own version
    ///
    /// Falls back to `record` when the entity already has history, and to
    /// `1.0.0` when its version does not parse.
    ///
    /// # Errors
    ///
    /// Returns `MetadataInvalid` if the previous version does not parse.
    pub fn record_baseline(
        &mut self,
        entity: &Entity,
        changelog: impl Into<String>,
        author: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<VersionSnapshot> {
        if self.latest(&entity.id).is_some() {
            return self.record(entity, changelog, ChangeType::Major, author, now);
        }
        let version = entity
            .version
            .parse::<SemVer>()
            .unwrap_or(SemVer::INITIAL)
            .to_string();
        Ok(self.push(entity, version, changelog.into(), ChangeType::Major, author.into(), now))
    }

    fn push(
        &mut self,
        entity: &Entity,
        version: String,
        changelog: String,
        change_type: ChangeType,
        author: String,
        now: DateTime<Utc>,
    ) -> VersionSnapshot {
        let parent_version = self.latest(&entity.id).map(|s| s.version.clone());

        let mut copy = entity.clone();
        copy.version = version.clone();

        let snapshot = VersionSnapshot {
            version,
            entity: copy,
            changelog,
            change_type,
            author,
            created_at: now,
            parent_version,
        };
        self.histories
            .entry(entity.id.clone())
            .or_default()
            .push(snapshot.clone());
        self.apply_retention_for(&entity.id, now);
        snapshot
    }

    pub fn get(&self, id: &str, version: &str) -> Option<&VersionSnapshot> {
        self.histories
            .get(id)
            .and_then(|h| h.iter().find(|s| s.version == version))
    }

    /// Look up a snapshot, failing with `VersionNotFound`
    ///
    /// # Errors
    ///
    /// Returns `VersionNotFound` if the entity has no such version.
    pub fn require(&self, id: &str, version: &str) -> Result<&VersionSnapshot> {
        self.get(id, version)
            .ok_or_else(|| DepotError::VersionNotFound {
                entity_id: id.to_string(),
                version: version.to_string(),
            })
    }

    pub fn history(&self, id: &str, options: &HistoryOptions) -> Vec<VersionSnapshot> {
        let Some(all) = self.histories.get(id) else {
            return Vec::new();
        };

        let mut selected: Vec<&VersionSnapshot> = all
            .iter()
            .filter(|s| {
                options
                    .change_types
                    .as_ref()
                    .map_or(true, |types| types.contains(&s.change_type))
            })
            .filter(|s| options.since.map_or(true, |since| s.created_at >= since))
            .filter(|s| options.until.map_or(true, |until| s.created_at <= until))
            .collect();

        // Stored order is creation order, which also breaks timestamp ties.
        if options.order == SortOrder::Desc {
            selected.reverse();
        }

        selected
            .into_iter()
            .skip(options.offset)
            .take(options.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn version_count(&self, id: &str) -> usize {
        self.histories.get(id).map_or(0, Vec::len)
    }

    /// Attach `tag` to a version; an existing tag of the same name moves
    ///
    /// # Errors
    ///
    /// Returns `VersionNotFound` if the entity has no such version.
    pub fn tag(&mut self, id: &str, version: &str, tag: &str) -> Result<()> {
        self.require(id, version)?;
        self.tags
            .entry(id.to_string())
            .or_default()
            .insert(tag.to_string(), version.to_string());
        Ok(())
    }

    pub fn by_tag(&self, id: &str, tag: &str) -> Option<&VersionSnapshot> {
        let version = self.tags.get(id)?.get(tag)?;
        self.get(id, version)
    }

    /// Tags pointing at one version, sorted
    pub fn tags_for(&self, id: &str, version: &str) -> Vec<String> {
        self.tags
            .get(id)
            .map(|tags| {
                tags.iter()
                    .filter(|(_, v)| v.as_str() == version)
                    .map(|(t, _)| t.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Structural comparison of two recorded versions
    ///
    /// # Errors
    ///
    /// Returns `VersionNotFound` if either version is missing.
    pub fn compare(&self, id: &str, from: &str, to: &str) -> Result<VersionComparison> {
        let a = self.require(id, from)?;
        let b = self.require(id, to)?;
        Ok(compare_snapshots(a, b))
    }

    pub fn note_rollback(&mut self) {
        self.total_rollbacks += 1;
    }

    /// Apply retention to one entity; returns the versions removed
    pub fn apply_retention_for(&mut self, id: &str, now: DateTime<Utc>) -> Vec<String> {
        let Some(history) = self.histories.get(id) else {
            return Vec::new();
        };
        let tagged: HashSet<String> = self
            .tags
            .get(id)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default();

        let doomed = self.policy.select_for_removal(history, &tagged, now);
        if doomed.is_empty() {
            return doomed;
        }
        if let Some(history) = self.histories.get_mut(id) {
            history.retain(|s| !doomed.contains(&s.version));
        }
        if let Some(tags) = self.tags.get_mut(id) {
            tags.retain(|_, v| !doomed.contains(v));
        }
        self.removed_by_retention += doomed.len() as u64;
        tracing::debug!(entity_id = id, removed = doomed.len(), "retention applied");
        doomed
    }

    /// Apply retention to every history; returns how many versions went
    pub fn apply_retention(&mut self, now: DateTime<Utc>) -> usize {
        let mut ids: Vec<String> = self.histories.keys().cloned().collect();
        ids.sort();
        ids.iter()
            .map(|id| self.apply_retention_for(id, now).len())
            .sum()
    }

    /// Forget an entity's history and tags
    pub fn remove_entity(&mut self, id: &str) {
        self.histories.remove(id);
        self.tags.remove(id);
    }

    pub fn stats(&self) -> VersionStats {
        VersionStats {
            total_versions: self.histories.values().map(Vec::len).sum(),
            entities_with_history: self.histories.values().filter(|h| !h.is_empty()).count(),
            total_rollbacks: self.total_rollbacks,
            removed_by_retention: self.removed_by_retention,
            tagged_versions: self.tags.values().map(BTreeMap::len).sum(),
            storage_bytes: self
                .histories
                .values()
                .flatten()
                .map(VersionSnapshot::approx_size)
                .sum(),
        }
    }

    pub fn clear(&mut self) {
        self.histories.clear();
        self.tags.clear();
    }

    pub fn to_archive(&self) -> VersionArchive {
        VersionArchive {
            histories: self
                .histories
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            tags: self
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            total_rollbacks: self.total_rollbacks,
        }
    }

    /// Replace all history with an archive's contents; the policy is kept
    pub fn restore_archive(&mut self, archive: VersionArchive) {
        self.histories = archive.histories.into_iter().collect();
        self.tags = archive.tags.into_iter().collect();
        self.total_rollbacks = archive.total_rollbacks;
    }
}
