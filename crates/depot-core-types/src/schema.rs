//! Canonical schema constants for structured logging and registry events
//!
//! Log macros and the event dispatcher both read their names from here so that
//! log consumers and event subscribers see the same vocabulary.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_TRACE_ID: &str = "trace_id";

// Entity identifiers
pub const FIELD_ENTITY_ID: &str = "entity_id";
pub const FIELD_ENTITY_TYPE: &str = "entity_type";
pub const FIELD_VERSION: &str = "version";

// Collection sizes
pub const FIELD_BATCH_LEN: &str = "batch_len";
pub const FIELD_RESULT_LEN: &str = "result_len";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical log event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

// Registry event names (publish/subscribe surface)
pub const REGISTRY_EVENT_REGISTER: &str = "register";
pub const REGISTRY_EVENT_UNREGISTER: &str = "unregister";
pub const REGISTRY_EVENT_CHANGE: &str = "change";
pub const REGISTRY_EVENT_ERROR: &str = "error";
pub const REGISTRY_EVENT_BATCH_COMPLETE: &str = "batch-register-complete";
pub const REGISTRY_EVENT_VALIDATION_FAILED: &str = "validation-failed";
pub const REGISTRY_EVENT_CLEAR: &str = "clear";
pub const REGISTRY_EVENT_VERSION_CREATED: &str = "version-created";
pub const REGISTRY_EVENT_VERSION_ROLLBACK: &str = "version-rollback";
