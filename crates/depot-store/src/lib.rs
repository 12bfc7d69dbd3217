//! Depot Store - filesystem persistence for registry snapshots
//!
//! Provides:
//! - Content-addressed blob storage with atomic writes and digest checks
//! - Named keys pointing at the latest snapshot blob for each key
//! - `FsPersistence`, a `PersistenceProvider` backed by both

pub mod blob;
pub mod errors;
pub mod fs_persistence;

// Re-export key types
pub use errors::Result;
pub use fs_persistence::{FsPersistence, KeyPointer};
