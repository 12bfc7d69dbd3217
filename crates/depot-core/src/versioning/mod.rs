//! Version history: snapshots, tags, retention, comparison

pub mod diff;
pub mod manager;
pub mod retention;

pub use diff::{compare_snapshots, ChangeKind, DiffSeverity, DiffSummary, FieldChange, VersionComparison};
pub use manager::{
    HistoryOptions, RollbackOptions, SortOrder, VersionArchive, VersionManager, VersionStats,
};
pub use retention::{RetentionFilter, RetentionPolicy};
