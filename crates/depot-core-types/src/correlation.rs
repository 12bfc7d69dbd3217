//! Correlation types for request tracking
//!
//! A `RequestContext` travels with an engine operation so that log lines and
//! structured errors emitted by that operation can be tied back together.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! correlation_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh time-ordered id (UUID v7)
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

correlation_id! {
    /// Identifier of a single engine call (register, rollback, batch, ...)
    RequestId
}

correlation_id! {
    /// Identifier shared by every call made on behalf of one caller-level action
    TraceId
}

/// Context carried through an engine operation
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub trace_id: Option<TraceId>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a trace id supplied by the caller
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// A new request inside the same trace
    ///
    /// Batch registration uses this so each item gets its own request id
    /// while staying correlated with the batch.
    pub fn child(&self) -> Self {
        Self {
            request_id: RequestId::new(),
            trace_id: self.trace_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn test_display_matches_inner_string() {
        let id = TraceId::from("trace-1".to_string());
        assert_eq!(id.to_string(), "trace-1");
        assert_eq!(id.as_str(), "trace-1");
    }

    #[test]
    fn test_child_context_keeps_trace() {
        let trace = TraceId::new();
        let parent = RequestContext::new().with_trace_id(trace.clone());
        let child = parent.child();

        assert_eq!(child.trace_id, Some(trace));
        assert_ne!(child.request_id, parent.request_id);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = RequestId::from("req-42".to_string());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"req-42\"");

        let back: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
