use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::Entity;

/// Kind of change a version records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Major,
    Minor,
    Patch,
    Hotfix,
}

impl std::str::FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "major" => Ok(ChangeType::Major),
            "minor" => Ok(ChangeType::Minor),
            "patch" => Ok(ChangeType::Patch),
            "hotfix" => Ok(ChangeType::Hotfix),
            other => Err(format!("unknown change type: {}", other)),
        }
    }
}

/// Immutable copy of an entity taken when a version is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub version: String,
    pub entity: Entity,
    pub changelog: String,
    pub change_type: ChangeType,
    pub author: String,
    pub created_at: DateTime<Utc>,
    /// Version this one was derived from; `None` for the first
    pub parent_version: Option<String>,
}

impl VersionSnapshot {
    pub fn entity_id(&self) -> &str {
        &self.entity.id
    }

    pub fn approx_size(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}
