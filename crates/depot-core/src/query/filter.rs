//! Query filters
//!
//! A query probes the single most selective index among the dimensions the
//! filter constrains, then checks every remaining predicate against that
//! candidate set. With no indexed dimension it scans the whole store.
//! Results are sorted (by id when no sort key is given) and paginated.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::model::{Entity, EntityStatus, EntityType, Priority, SemVer};
use crate::store::{EntityStore, IndexKey, IndexManager};
use crate::versioning::SortOrder;

pub type EntityPredicate = Arc<dyn Fn(&Entity) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagMatch {
    /// Entity carries every listed tag
    #[default]
    All,
    /// Entity carries at least one listed tag
    Any,
}

#[derive(Debug, Clone)]
pub enum NameMatch {
    /// Case-insensitive substring
    Contains(String),
    Pattern(Regex),
}

impl NameMatch {
    fn matches(&self, name: &str) -> bool {
        match self {
            NameMatch::Contains(needle) => name.to_lowercase().contains(&needle.to_lowercase()),
            NameMatch::Pattern(re) => re.is_match(name),
        }
    }
}

/// Inclusive time window; open ends are unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| t >= s) && self.end.map_or(true, |e| t <= e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    Name,
    Type,
    Status,
    Priority,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            order: SortOrder::Desc,
        }
    }

    fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        let ord = match self.field {
            SortField::Id => a.id.cmp(&b.id),
            SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortField::Type => a.entity_type.cmp(&b.entity_type),
            SortField::Status => a.status.cmp(&b.status),
            SortField::Priority => a.priority.cmp(&b.priority),
            SortField::Version => {
                match (a.version.parse::<SemVer>(), b.version.parse::<SemVer>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => a.version.cmp(&b.version),
                }
            }
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        match self.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }
}

#[derive(Clone, Default)]
pub struct QueryFilter {
    pub entity_type: Option<EntityType>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub tag_match: TagMatch,
    pub status: Option<EntityStatus>,
    pub priority: Option<Priority>,
    pub name: Option<NameMatch>,
    pub created: Option<TimeRange>,
    pub updated: Option<TimeRange>,
    pub has_dependency: Option<String>,
    pub predicate: Option<EntityPredicate>,
    pub sort: Vec<SortKey>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl std::fmt::Debug for QueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryFilter")
            .field("entity_type", &self.entity_type)
            .field("category", &self.category)
            .field("tags", &self.tags)
            .field("tag_match", &self.tag_match)
            .field("status", &self.status)
            .field("priority", &self.priority)
            .field("name", &self.name)
            .field("created", &self.created)
            .field("updated", &self.updated)
            .field("has_dependency", &self.has_dependency)
            .field("predicate", &self.predicate.is_some())
            .field("sort", &self.sort)
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .finish()
    }
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tag_match(mut self, tag_match: TagMatch) -> Self {
        self.tag_match = tag_match;
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

    pub fn name_contains(mut self, needle: impl Into<String>) -> Self {
        self.name = Some(NameMatch::Contains(needle.into()));
        self
    }

    /// Match names against a regular expression (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns the regex compile error for an invalid pattern.
    pub fn name_regex(mut self, pattern: &str) -> Result<Self, regex::Error> {
        let re = Regex::new(&format!("(?i){}", pattern))?;
        self.name = Some(NameMatch::Pattern(re));
        Ok(self)
    }

    pub fn created_between(mut self, range: TimeRange) -> Self {
        self.created = Some(range);
        self
    }

    pub fn updated_between(mut self, range: TimeRange) -> Self {
        self.updated = Some(range);
        self
    }

    pub fn has_dependency(mut self, id: impl Into<String>) -> Self {
        self.has_dependency = Some(id.into());
        self
    }

    pub fn predicate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Entity) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(f));
        self
    }

    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether an entity passes every predicate (pagination aside)
    pub fn matches(&self, entity: &Entity) -> bool {
        if self.entity_type.is_some_and(|t| t != entity.entity_type) {
            return false;
        }
        if let Some(category) = &self.category {
            if entity.category.as_ref() != Some(category) {
                return false;
            }
        }
        if !self.tags.is_empty() {
            let ok = match self.tag_match {
                TagMatch::All => self.tags.iter().all(|t| entity.tags.contains(t)),
                TagMatch::Any => self.tags.iter().any(|t| entity.tags.contains(t)),
            };
            if !ok {
                return false;
            }
        }
        if self.status.is_some_and(|s| s != entity.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != entity.priority) {
            return false;
        }
        if let Some(name) = &self.name {
            if !name.matches(&entity.name) {
                return false;
            }
        }
        if self.created.is_some_and(|r| !r.contains(entity.created_at)) {
            return false;
        }
        if self.updated.is_some_and(|r| !r.contains(entity.updated_at)) {
            return false;
        }
        if let Some(dep) = &self.has_dependency {
            if !entity.depends_on(dep) {
                return false;
            }
        }
        if let Some(predicate) = &self.predicate {
            if !predicate(entity) {
                return false;
            }
        }
        true
    }

    /// Index buckets this filter could start from
    fn probes(&self, index: &IndexManager) -> Vec<BTreeSet<String>> {
        let mut probes = Vec::new();
        let bucket = |key: IndexKey| -> BTreeSet<String> { index.ids(&key).into_iter().collect() };

        if let Some(t) = self.entity_type {
            probes.push(bucket(IndexKey::Type(t)));
        }
        if let Some(c) = &self.category {
            probes.push(bucket(IndexKey::Category(c.clone())));
        }
        if let Some(s) = self.status {
            probes.push(bucket(IndexKey::Status(s)));
        }
        if let Some(p) = self.priority {
            probes.push(bucket(IndexKey::Priority(p)));
        }
        if !self.tags.is_empty() {
            match self.tag_match {
                TagMatch::All => {
                    for tag in &self.tags {
                        probes.push(bucket(IndexKey::Tag(tag.clone())));
                    }
                }
                TagMatch::Any => {
                    let union = self
                        .tags
                        .iter()
                        .flat_map(|tag| index.ids(&IndexKey::Tag(tag.clone())))
                        .collect();
                    probes.push(union);
                }
            }
        }
        probes
    }
}

/// Run a query against the store, returning owned copies
pub fn execute(filter: &QueryFilter, store: &EntityStore, index: &IndexManager) -> Vec<Entity> {
    let smallest = filter
        .probes(index)
        .into_iter()
        .min_by_key(BTreeSet::len);

    let mut results: Vec<&Entity> = match smallest {
        Some(ids) => ids
            .iter()
            .filter_map(|id| store.get(id).ok())
            .filter(|e| filter.matches(e))
            .collect(),
        None => store.iter().filter(|e| filter.matches(e)).collect(),
    };

    results.sort_by(|a, b| {
        filter
            .sort
            .iter()
            .map(|key| key.compare(a, b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| a.id.cmp(&b.id))
    });

    results
        .into_iter()
        .skip(filter.offset)
        .take(filter.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect()
}
