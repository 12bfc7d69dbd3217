pub mod entity;
pub mod lifecycle;
pub mod semver;
pub mod version;

pub use entity::{Entity, EntityPatch, EntityType, Priority};
pub use lifecycle::{deletion_outcome, DeleteMode, DeletionOutcome, EntityStatus, StatusEvent};
pub use semver::SemVer;
pub use version::{ChangeType, VersionSnapshot};
