use depot_core_types::{RequestContext, RequestId, TraceId};
use thiserror::Error;

/// Result type alias using DepotError
pub type Result<T> = std::result::Result<T, DepotError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure the engine reports is classified into one of these kinds.
/// Each kind maps to a stable code that callers and tests can match on
/// without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Registration
    MetadataInvalid,
    DuplicateId,
    ValidationFailed,
    HookFailed,

    // Graph
    CycleDetected,
    DependencyMissing,
    HasDependents,

    // Lookup
    NotFound,
    VersionNotFound,

    // History
    RollbackFailed,

    // Configuration
    InvalidConfig,

    // Integration/IO
    Io,
    Serialization,
    Persistence,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::MetadataInvalid => "ERR_METADATA_INVALID",
            ExErrorKind::DuplicateId => "ERR_DUPLICATE_ID",
            ExErrorKind::ValidationFailed => "ERR_VALIDATION_FAILED",
            ExErrorKind::HookFailed => "ERR_HOOK_FAILED",
            ExErrorKind::CycleDetected => "ERR_CYCLE_DETECTED",
            ExErrorKind::DependencyMissing => "ERR_DEPENDENCY_MISSING",
            ExErrorKind::HasDependents => "ERR_HAS_DEPENDENTS",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::VersionNotFound => "ERR_VERSION_NOT_FOUND",
            ExErrorKind::RollbackFailed => "ERR_ROLLBACK_FAILED",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a kind for programmatic handling plus optional context
/// (operation, entity, version, correlation ids) for diagnostics.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    version: Option<String>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            version: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity ID context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add version context
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add trace ID context
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Copy request and trace ids from a request context
    pub fn with_context(mut self, ctx: &RequestContext) -> Self {
        self.request_id = Some(ctx.request_id.clone());
        self.trace_id = ctx.trace_id.clone();
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(version) = &self.version {
            write!(f, " (version: {})", version)?;
        }
        if let Some(source) = &self.source {
            write!(f, " caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for Depot operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DepotError {
    /// A required field is missing or malformed
    #[error("Invalid metadata for entity '{entity_id}': {reason}")]
    MetadataInvalid { entity_id: String, reason: String },

    /// An entity with this id is already registered
    #[error("Entity already registered: {entity_id}")]
    DuplicateId { entity_id: String },

    /// A validate hook or validation provider rejected the entity
    #[error("Validation failed for entity '{entity_id}': {}", .errors.join("; "))]
    ValidationFailed {
        entity_id: String,
        errors: Vec<String>,
    },

    /// A dependency cycle passes through this entity
    #[error("Dependency cycle detected at entity: {entity_id}")]
    CycleDetected { entity_id: String },

    /// A referenced dependency is not registered
    #[error("Entity '{entity_id}' depends on unregistered entity '{dependency_id}'")]
    DependencyMissing {
        entity_id: String,
        dependency_id: String,
    },

    /// No live entity with this id
    #[error("Entity not found: {entity_id}")]
    EntityNotFound { entity_id: String },

    /// The entity has no snapshot with this version
    #[error("Version {version} not found for entity '{entity_id}'")]
    VersionNotFound { entity_id: String, version: String },

    /// The restored state failed validation
    #[error("Rollback of entity '{entity_id}' to {version} failed: {reason}")]
    RollbackFailed {
        entity_id: String,
        version: String,
        reason: String,
    },

    /// Hard delete refused because registered entities still depend on this one
    #[error("Entity '{entity_id}' has dependents: {dependents:?}")]
    HasDependents {
        entity_id: String,
        dependents: Vec<String>,
    },

    /// An initialize or cleanup hook failed
    #[error("Hook '{hook}' failed for entity '{entity_id}': {reason}")]
    HookFailed {
        entity_id: String,
        hook: String,
        reason: String,
    },

    /// The persistence provider failed to save or load
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Configuration value out of range or unparsable
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl DepotError {
    /// Stable error kind for this error
    pub fn kind(&self) -> ExErrorKind {
        match self {
            DepotError::MetadataInvalid { .. } => ExErrorKind::MetadataInvalid,
            DepotError::DuplicateId { .. } => ExErrorKind::DuplicateId,
            DepotError::ValidationFailed { .. } => ExErrorKind::ValidationFailed,
            DepotError::CycleDetected { .. } => ExErrorKind::CycleDetected,
            DepotError::DependencyMissing { .. } => ExErrorKind::DependencyMissing,
            DepotError::EntityNotFound { .. } => ExErrorKind::NotFound,
            DepotError::VersionNotFound { .. } => ExErrorKind::VersionNotFound,
            DepotError::RollbackFailed { .. } => ExErrorKind::RollbackFailed,
            DepotError::HasDependents { .. } => ExErrorKind::HasDependents,
            DepotError::HookFailed { .. } => ExErrorKind::HookFailed,
            DepotError::Persistence { .. } => ExErrorKind::Persistence,
            DepotError::Serialization { .. } => ExErrorKind::Serialization,
            DepotError::InvalidConfig { .. } => ExErrorKind::InvalidConfig,
        }
    }
}

/// Conversion from DepotError to ExError
impl From<DepotError> for ExError {
    fn from(err: DepotError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        let ex = ExError::new(kind).with_message(message);
        match err {
            DepotError::MetadataInvalid { entity_id, .. }
            | DepotError::DuplicateId { entity_id }
            | DepotError::ValidationFailed { entity_id, .. }
            | DepotError::CycleDetected { entity_id }
            | DepotError::DependencyMissing { entity_id, .. }
            | DepotError::EntityNotFound { entity_id }
            | DepotError::HasDependents { entity_id, .. }
            | DepotError::HookFailed { entity_id, .. } => ex.with_entity_id(entity_id),

            DepotError::VersionNotFound {
                entity_id, version, ..
            }
            | DepotError::RollbackFailed {
                entity_id, version, ..
            } => ex.with_entity_id(entity_id).with_version(version),

            DepotError::Persistence { .. }
            | DepotError::Serialization { .. }
            | DepotError::InvalidConfig { .. } => ex,
        }
    }
}

/// Conversion from serde_json::Error to DepotError
impl From<serde_json::Error> for DepotError {
    fn from(err: serde_json::Error) -> Self {
        DepotError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes() {
        let cases = [
            (ExErrorKind::MetadataInvalid, "ERR_METADATA_INVALID"),
            (ExErrorKind::DuplicateId, "ERR_DUPLICATE_ID"),
            (ExErrorKind::CycleDetected, "ERR_CYCLE_DETECTED"),
            (ExErrorKind::VersionNotFound, "ERR_VERSION_NOT_FOUND"),
            (ExErrorKind::RollbackFailed, "ERR_ROLLBACK_FAILED"),
            (ExErrorKind::HasDependents, "ERR_HAS_DEPENDENTS"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_depot_error_converts_with_context() {
        let err = DepotError::VersionNotFound {
            entity_id: "cfg".to_string(),
            version: "9.9.9".to_string(),
        };
        let ex: ExError = err.into();

        assert_eq!(ex.kind(), ExErrorKind::VersionNotFound);
        assert_eq!(ex.entity_id(), Some("cfg"));
        assert_eq!(ex.version(), Some("9.9.9"));
    }

    #[test]
    fn test_display_includes_code_and_op() {
        let ex = ExError::new(ExErrorKind::NotFound)
            .with_op("get")
            .with_entity_id("a")
            .with_message("missing");
        let text = ex.to_string();

        assert!(text.starts_with("[ERR_NOT_FOUND]"));
        assert!(text.contains("in operation 'get'"));
        assert!(text.contains("(entity_id: a)"));
    }

    #[test]
    fn test_with_context_copies_correlation_ids() {
        let trace = TraceId::new();
        let ctx = RequestContext::new().with_trace_id(trace.clone());
        let ex = ExError::new(ExErrorKind::Internal).with_context(&ctx);

        assert_eq!(ex.request_id(), Some(&ctx.request_id));
        assert_eq!(ex.trace_id(), Some(&trace));
    }

    #[test]
    fn test_serde_error_maps_to_serialization() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json");
        let err: DepotError = bad.unwrap_err().into();
        assert_eq!(err.kind(), ExErrorKind::Serialization);
    }
}
