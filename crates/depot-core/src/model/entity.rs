use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lifecycle::EntityStatus;

/// Closed set of entity kinds the registry manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    Component,
    Renderer,
    DataSource,
    Template,
    Plugin,
    Theme,
    Layout,
    InteractionConfig,
    DeviceTemplate,
    Dashboard,
    UiSettings,
    AlarmRule,
    SceneLinkage,
    I18n,
    System,
    General,
}

impl EntityType {
    pub const ALL: [EntityType; 16] = [
        EntityType::Component,
        EntityType::Renderer,
        EntityType::DataSource,
        EntityType::Template,
        EntityType::Plugin,
        EntityType::Theme,
        EntityType::Layout,
        EntityType::InteractionConfig,
        EntityType::DeviceTemplate,
        EntityType::Dashboard,
        EntityType::UiSettings,
        EntityType::AlarmRule,
        EntityType::SceneLinkage,
        EntityType::I18n,
        EntityType::System,
        EntityType::General,
    ];

    /// Wire name (kebab-case)
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Component => "component",
            EntityType::Renderer => "renderer",
            EntityType::DataSource => "data-source",
            EntityType::Template => "template",
            EntityType::Plugin => "plugin",
            EntityType::Theme => "theme",
            EntityType::Layout => "layout",
            EntityType::InteractionConfig => "interaction-config",
            EntityType::DeviceTemplate => "device-template",
            EntityType::Dashboard => "dashboard",
            EntityType::UiSettings => "ui-settings",
            EntityType::AlarmRule => "alarm-rule",
            EntityType::SceneLinkage => "scene-linkage",
            EntityType::I18n => "i18n",
            EntityType::System => "system",
            EntityType::General => "general",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown entity type: {}", s))
    }
}

/// Ordinal priority; declaration order matches numeric order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
    System,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Urgent,
        Priority::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
            Priority::System => "system",
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Normal => 5,
            Priority::High => 10,
            Priority::Urgent => 20,
            Priority::System => 100,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown priority: {}", s))
    }
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_content() -> Value {
    Value::Object(Default::default())
}

/// A registered record
///
/// Everything the engine indexes lives here; behaviour (hooks) travels
/// alongside in a `RegistryItem`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,

    #[serde(rename = "type")]
    pub entity_type: EntityType,

    /// Semantic version string (`MAJOR.MINOR.PATCH[-pre][+build]`)
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub status: EntityStatus,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Ids this entity requires; may name entities not registered yet
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    /// Caller-owned payload
    #[serde(default = "default_content")]
    pub content: Value,
}

impl Entity {
    /// Create a Draft entity at version 1.0.0 with empty content
    pub fn new(id: impl Into<String>, name: impl Into<String>, entity_type: EntityType) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            entity_type,
            version: default_version(),
            status: EntityStatus::Draft,
            priority: Priority::Normal,
            category: None,
            tags: BTreeSet::new(),
            dependencies: Vec::new(),
            description: String::new(),
            author: None,
            created_at: now,
            updated_at: now,
            content: default_content(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_status(mut self, status: EntityStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set dependencies, dropping duplicates while keeping first-seen order
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.clear();
        for dep in deps {
            let dep = dep.into();
            if !self.dependencies.contains(&dep) {
                self.dependencies.push(dep);
            }
        }
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    pub fn depends_on(&self, id: &str) -> bool {
        self.dependencies.iter().any(|d| d == id)
    }

    /// Serialized JSON length, used for storage estimates
    pub fn approx_size(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }

    /// Apply a patch in place
    ///
    /// Object content is merged key by key (a `null` value removes the key);
    /// any other content replaces the old value wholesale.
    pub fn apply_patch(&mut self, patch: &EntityPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(version) = &patch.version {
            self.version = version.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(category) = &patch.category {
            self.category = category.clone();
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
        if let Some(deps) = &patch.dependencies {
            let mut unique = Vec::with_capacity(deps.len());
            for dep in deps {
                if !unique.contains(dep) {
                    unique.push(dep.clone());
                }
            }
            self.dependencies = unique;
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(author) = &patch.author {
            self.author = author.clone();
        }
        if let Some(content) = &patch.content {
            merge_content(&mut self.content, content);
        }
    }
}

fn merge_content(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                if value.is_null() {
                    existing.remove(key);
                } else {
                    existing.insert(key.clone(), value.clone());
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Partial update; `None` leaves a field untouched
///
/// `category` and `author` are doubly optional so a patch can clear them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityPatch {
    pub name: Option<String>,
    pub version: Option<String>,
    pub status: Option<EntityStatus>,
    pub priority: Option<Priority>,
    pub category: Option<Option<String>>,
    pub tags: Option<BTreeSet<String>>,
    pub dependencies: Option<Vec<String>>,
    pub description: Option<String>,
    pub author: Option<Option<String>>,
    pub content: Option<Value>,
}

impl EntityPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn status(mut self, status: EntityStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn category(mut self, category: Option<String>) -> Self {
        self.category = Some(category);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = Some(deps.into_iter().map(Into::into).collect());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn content(mut self, content: Value) -> Self {
        self.content = Some(content);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
