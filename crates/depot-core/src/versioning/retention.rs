//! Version retention policy
//!
//! A version is removed only when it is over a limit (count or age) and no
//! keep-condition protects it. The newest version of an entity is never
//! removed.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::RetentionConfig;
use crate::model::{ChangeType, VersionSnapshot};

/// Returns true to keep a version regardless of limits
pub type RetentionFilter = Arc<dyn Fn(&VersionSnapshot) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct RetentionPolicy {
    pub max_versions: usize,
    pub retention_days: u32,
    pub keep_milestones: bool,
    pub keep_tagged_versions: bool,
    pub custom_retention: Option<RetentionFilter>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from(&RetentionConfig::default())
    }
}

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            max_versions: config.max_versions,
            retention_days: config.retention_days,
            keep_milestones: config.keep_milestones,
            keep_tagged_versions: config.keep_tagged_versions,
            custom_retention: None,
        }
    }
}

impl std::fmt::Debug for RetentionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionPolicy")
            .field("max_versions", &self.max_versions)
            .field("retention_days", &self.retention_days)
            .field("keep_milestones", &self.keep_milestones)
            .field("keep_tagged_versions", &self.keep_tagged_versions)
            .field("custom_retention", &self.custom_retention.is_some())
            .finish()
    }
}

impl RetentionPolicy {
    pub fn with_custom_retention(mut self, filter: RetentionFilter) -> Self {
        self.custom_retention = Some(filter);
        self
    }

    fn is_protected(&self, snapshot: &VersionSnapshot, tagged: &HashSet<String>) -> bool {
        if self.keep_tagged_versions && tagged.contains(&snapshot.version) {
            return true;
        }
        if self.keep_milestones && snapshot.change_type == ChangeType::Major {
            return true;
        }
        self.custom_retention
            .as_ref()
            .is_some_and(|keep| keep(snapshot))
    }

    /// Versions to drop from one entity's history
    ///
    /// `history` is in creation order (oldest first); `tagged` holds the
    /// versions that carry at least one tag.
    pub fn select_for_removal(
        &self,
        history: &[VersionSnapshot],
        tagged: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let Some((_latest, older)) = history.split_last() else {
            return Vec::new();
        };

        let cutoff = now - Duration::days(i64::from(self.retention_days));
        // Newest-first rank: index 0 is the latest version.
        let over_count = |rank: usize| rank >= self.max_versions;

        older
            .iter()
            .rev()
            .enumerate()
            .filter(|(i, snapshot)| over_count(i + 1) || snapshot.created_at < cutoff)
            .filter(|(_, snapshot)| !self.is_protected(snapshot, tagged))
            .map(|(_, snapshot)| snapshot.version.clone())
            .collect()
    }
}
