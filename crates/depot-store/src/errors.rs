//! Error handling for depot-store
//!
//! Wraps depot-core ExError with store-specific helpers

use depot_core::errors::{DepotError, ExError, ExErrorKind};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Create a blob collision error
pub fn blob_collision(digest: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("blob_write")
        .with_message(format!("blob collision for digest {}", digest))
}

/// Create a missing blob error
pub fn blob_missing(digest: &str) -> ExError {
    ExError::new(ExErrorKind::NotFound)
        .with_op("blob_read")
        .with_message(format!("blob not found for digest {}", digest))
}

/// Create a corrupted blob error (bytes no longer hash to their digest)
pub fn blob_corrupt(digest: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("blob_verify")
        .with_message(format!("blob {} hashes to {}", digest, actual))
}

/// Create an invalid key error
pub fn invalid_key(key: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("resolve_key")
        .with_message(format!("invalid key '{}': {}", key, reason))
}

/// Create a serialization error from serde_json::Error
pub fn from_serde(operation: &str, err: serde_json::Error) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Collapse a store error into the engine's persistence error
pub fn into_depot(err: ExError) -> DepotError {
    DepotError::Persistence {
        message: err.to_string(),
    }
}
