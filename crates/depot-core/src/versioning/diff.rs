//! Structural comparison of two version snapshots
//!
//! Snapshots are compared as JSON trees. Objects are compared key by key,
//! arrays index by index; every differing leaf yields one `FieldChange`
//! with a dotted path (`content.limits.max`, `tags[1]`). The snapshot's
//! `version` and `updated_at` fields are excluded since they differ between
//! any two versions by construction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::VersionSnapshot;

const IGNORED_FIELDS: &[&str] = &["version", "updated_at"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// How far-reaching the most significant change is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DiffSeverity {
    None,
    /// Descriptive fields (name, description, tags, ...)
    Metadata,
    /// Caller payload
    Content,
    /// Type or dependency edges
    Structural,
}

impl DiffSeverity {
    fn for_path(path: &str) -> DiffSeverity {
        let top = path
            .split(['.', '['])
            .next()
            .unwrap_or_default();
        match top {
            "content" => DiffSeverity::Content,
            "type" | "dependencies" | "id" => DiffSeverity::Structural,
            _ => DiffSeverity::Metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldChange {
    pub path: String,
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffSummary {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
}

impl DiffSummary {
    pub fn total(&self) -> usize {
        self.added + self.modified + self.removed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionComparison {
    pub entity_id: String,
    pub from_version: String,
    pub to_version: String,
    pub identical: bool,
    pub severity: DiffSeverity,
    pub summary: DiffSummary,
    pub changes: Vec<FieldChange>,
}

/// Compare two snapshots of the same entity
pub fn compare_snapshots(from: &VersionSnapshot, to: &VersionSnapshot) -> VersionComparison {
    let left = comparable(&from.entity);
    let right = comparable(&to.entity);

    let mut changes = Vec::new();
    diff_values("", &left, &right, &mut changes);

    let mut summary = DiffSummary::default();
    for change in &changes {
        match change.kind {
            ChangeKind::Added => summary.added += 1,
            ChangeKind::Modified => summary.modified += 1,
            ChangeKind::Removed => summary.removed += 1,
        }
    }
    let severity = changes
        .iter()
        .map(|c| DiffSeverity::for_path(&c.path))
        .max()
        .unwrap_or(DiffSeverity::None);

    VersionComparison {
        entity_id: from.entity.id.clone(),
        from_version: from.version.clone(),
        to_version: to.version.clone(),
        identical: changes.is_empty(),
        severity,
        summary,
        changes,
    }
}

fn comparable(entity: &crate::model::Entity) -> Value {
    let mut value = serde_json::to_value(entity).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        for field in IGNORED_FIELDS {
            map.remove(*field);
        }
    }
    value
}

fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// Append every leaf difference between `a` and `b` under `path`
pub fn diff_values(path: &str, a: &Value, b: &Value, out: &mut Vec<FieldChange>) {
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => {
            for (key, lv) in left {
                let child = join(path, key);
                match right.get(key) {
                    Some(rv) => diff_values(&child, lv, rv, out),
                    None => out.push(FieldChange {
                        path: child,
                        kind: ChangeKind::Removed,
                        old: Some(lv.clone()),
                        new: None,
                    }),
                }
            }
            for (key, rv) in right {
                if !left.contains_key(key) {
                    out.push(FieldChange {
                        path: join(path, key),
                        kind: ChangeKind::Added,
                        old: None,
                        new: Some(rv.clone()),
                    });
                }
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            for i in 0..left.len().max(right.len()) {
                let child = format!("{}[{}]", path, i);
                match (left.get(i), right.get(i)) {
                    (Some(lv), Some(rv)) => diff_values(&child, lv, rv, out),
                    (Some(lv), None) => out.push(FieldChange {
                        path: child,
                        kind: ChangeKind::Removed,
                        old: Some(lv.clone()),
                        new: None,
                    }),
                    (None, Some(rv)) => out.push(FieldChange {
                        path: child,
                        kind: ChangeKind::Added,
                        old: None,
                        new: Some(rv.clone()),
                    }),
                    (None, None) => {}
                }
            }
        }
        (left, right) if left != right => out.push(FieldChange {
            path: path.to_string(),
            kind: ChangeKind::Modified,
            old: Some(left.clone()),
            new: Some(right.clone()),
        }),
        _ => {}
    }
}
