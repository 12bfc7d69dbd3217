//! Entity status state machine
//!
//! ```text
//! Draft --Activate--> Active --Archive--> Archived
//!                       |  ^
//!                  Fail |  | Recover
//!                       v  |
//!                      Error
//! any --Deprecate--> Deprecated
//! ```
//!
//! Deletion is expressed the same way: `deletion_outcome` says what a delete
//! does to an entity; the engine performs the physical removal.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    #[default]
    Draft,
    Active,
    Archived,
    Deprecated,
    Error,
}

impl EntityStatus {
    pub const ALL: [EntityStatus; 5] = [
        EntityStatus::Draft,
        EntityStatus::Active,
        EntityStatus::Archived,
        EntityStatus::Deprecated,
        EntityStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Draft => "draft",
            EntityStatus::Active => "active",
            EntityStatus::Archived => "archived",
            EntityStatus::Deprecated => "deprecated",
            EntityStatus::Error => "error",
        }
    }

    /// Statuses a freshly registered entity may carry
    pub fn is_registrable(&self) -> bool {
        matches!(self, EntityStatus::Draft | EntityStatus::Active)
    }

    /// Apply an event; `None` means the event is not legal in this state
    pub fn transition(self, event: StatusEvent) -> Option<EntityStatus> {
        use EntityStatus::*;
        match (self, event) {
            (Draft, StatusEvent::Activate) => Some(Active),
            (Active, StatusEvent::Archive) => Some(Archived),
            (Draft | Active | Error, StatusEvent::Fail) => Some(Error),
            (Error, StatusEvent::Recover) => Some(Active),
            (_, StatusEvent::Deprecate) => Some(Deprecated),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityStatus::ALL
            .iter()
            .find(|st| st.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown status: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    Activate,
    Archive,
    Deprecate,
    Fail,
    Recover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Keep the record, mark it Deprecated
    Soft,
    /// Remove the record entirely
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    Retained(EntityStatus),
    Removed,
}

/// What deleting an entity in `status` with `mode` leaves behind
pub fn deletion_outcome(status: EntityStatus, mode: DeleteMode) -> DeletionOutcome {
    match mode {
        DeleteMode::Soft => DeletionOutcome::Retained(
            status
                .transition(StatusEvent::Deprecate)
                .unwrap_or(EntityStatus::Deprecated),
        ),
        DeleteMode::Hard => DeletionOutcome::Removed,
    }
}
