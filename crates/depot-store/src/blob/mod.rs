//! Content-addressed blob storage
//!
//! Provides:
//! - Filesystem blob store with atomic writes
//! - Collision and corruption detection
//! - Sharding by first 2 hex chars of digest

mod atomic;
mod fs_blobs;
mod sharding;

pub(crate) use atomic::atomic_write;
pub use fs_blobs::{compute_digest, BlobStore};
