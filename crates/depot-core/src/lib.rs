//! Depot Core - indexed entity registry
//!
//! This crate provides an in-memory registry of typed, versioned entities:
//! - Canonical entity store with secondary indexes (type, category, tag,
//!   status, priority)
//! - Dependency graph with cycle detection and topological ordering
//! - Registration lifecycle with async hooks, per-type validation providers
//!   and a validation cache
//! - Version history with semantic versioning, tags, retention, rollback and
//!   structural diffs
//! - Queries, statistics, metadata export, events and persistence
//!
//! Everything is driven through one `RegistryEngine` per context.

pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod graph;
pub mod lifecycle;
pub mod logging_facility;
pub mod model;
pub mod persistence;
pub mod query;
pub mod store;
pub mod versioning;

// Logging macros name schema constants through this path.
pub use depot_core_types;

// Re-export commonly used types
pub use config::{EngineConfig, RetentionConfig};
pub use engine::{BatchItemResult, BatchOutcome, RegistryEngine};
pub use errors::{DepotError, ExError, ExErrorKind, Result};
pub use events::{EventDispatcher, RegistryEvent, SubscriptionId};
pub use lifecycle::{EntityHooks, RegistryItem, ValidationProvider};
pub use model::{
    ChangeType, DeleteMode, Entity, EntityPatch, EntityStatus, EntityType, Priority, SemVer,
    StatusEvent, VersionSnapshot,
};
pub use persistence::{EngineSnapshot, InMemoryPersistence, PersistenceProvider};
pub use query::{QueryFilter, SortField, SortKey, Stats, TagMatch};
pub use versioning::{HistoryOptions, RollbackOptions, SortOrder, VersionComparison};
