//! Metadata-only export
//!
//! Content payloads can be large and are often opaque to consumers of a
//! catalogue, so the export carries everything except `content`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::model::{Entity, EntityStatus, EntityType, Priority};
use crate::store::EntityStore;

pub const EXPORT_FORMAT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub version: String,
    pub status: EntityStatus,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tags: BTreeSet<String>,
    pub dependencies: Vec<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Entity> for EntityMetadata {
    fn from(e: &Entity) -> Self {
        Self {
            id: e.id.clone(),
            name: e.name.clone(),
            entity_type: e.entity_type,
            version: e.version.clone(),
            status: e.status,
            priority: e.priority,
            category: e.category.clone(),
            tags: e.tags.clone(),
            dependencies: e.dependencies.clone(),
            description: e.description.clone(),
            author: e.author.clone(),
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub format_version: String,
    pub exported_at: DateTime<Utc>,
    pub count: usize,
    pub entities: Vec<EntityMetadata>,
}

/// Render every entity's metadata as pretty JSON, ordered by id
///
/// # Errors
///
/// Returns `Serialization` if encoding fails.
pub fn export_metadata(store: &EntityStore, now: DateTime<Utc>) -> Result<String> {
    let entities: Vec<EntityMetadata> = store.list().into_iter().map(EntityMetadata::from).collect();
    let doc = ExportDocument {
        format_version: EXPORT_FORMAT_VERSION.to_string(),
        exported_at: now,
        count: entities.len(),
        entities,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}
