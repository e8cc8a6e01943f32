//! The operations the UI runtime can invoke on the host, and the structured
//! results they return.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::{ControllerChange, ControllerDescription, ControllerId};

// ─────────────────────────────────────────────────────────────────────────────
// Call Result
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a successful method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
#[ts(export)]
pub enum CallResult {
    /// The method was an action; there is nothing to return
    Undefined,
    /// The serialized return value of a function
    Value(Value),
}

impl CallResult {
    pub fn is_undefined(&self) -> bool {
        matches!(self, CallResult::Undefined)
    }

    /// Returned value, if any
    pub fn value(&self) -> Option<&Value> {
        match self {
            CallResult::Undefined => None,
            CallResult::Value(value) => Some(value),
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            CallResult::Undefined => None,
            CallResult::Value(value) => Some(value),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Remote Error
// ─────────────────────────────────────────────────────────────────────────────

/// Category of a failure reported to the remote caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum ErrorKind {
    /// Blank method/property name or similar malformed request
    InvalidArgument,
    /// No member matched after all naming fallbacks
    NotFound,
    /// Argument count differs from the parameter count
    ArityMismatch,
    /// An argument could not be decoded into its declared type
    ArgumentTypeMismatch,
    /// The controller id is unknown (never created or already destroyed)
    ControllerNotFound,
    /// Anything else (invocation failure, encoding failure)
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "invalid argument"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::ArityMismatch => write!(f, "arity mismatch"),
            ErrorKind::ArgumentTypeMismatch => write!(f, "argument type mismatch"),
            ErrorKind::ControllerNotFound => write!(f, "controller not found"),
            ErrorKind::Internal => write!(f, "internal error"),
        }
    }
}

/// Structured failure surfaced to the remote caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, thiserror::Error)]
#[error("{kind}: {message}")]
#[ts(export)]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Host Boundary
// ─────────────────────────────────────────────────────────────────────────────

/// Operations the UI runtime performs on the host
///
/// Every call is a synchronous round-trip from the caller's point of view.
/// Implementations must be callable from any thread.
pub trait HostBoundary: Send + Sync {
    /// Instantiate a controller by name and describe it
    fn create_controller(&self, name: &str) -> Result<ControllerDescription, RemoteError>;

    /// Invoke a user-visible method
    fn call_method(
        &self,
        id: ControllerId,
        name: &str,
        args: Vec<Value>,
    ) -> Result<CallResult, RemoteError>;

    /// Invoke a framework-internal method (e.g. the warm-up call)
    fn call_internal_method(
        &self,
        id: ControllerId,
        name: &str,
        args: Vec<Value>,
    ) -> Result<CallResult, RemoteError>;

    /// Dispose of a controller the UI no longer uses
    fn destroy_controller(&self, id: ControllerId);

    /// Apply a batch of UI-originated changes
    fn sync_controller_changes(&self, batch: Vec<ControllerChange>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_result_wire_shape() {
        assert_eq!(
            serde_json::to_value(CallResult::Undefined).unwrap(),
            json!({"kind": "undefined"})
        );
        assert_eq!(
            serde_json::to_value(CallResult::Value(json!(5))).unwrap(),
            json!({"kind": "value", "value": 5})
        );
        assert_eq!(CallResult::Value(json!("x")).into_value(), Some(json!("x")));
        assert!(CallResult::Undefined.value().is_none());
    }

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::new(ErrorKind::NotFound, "Method 'foo' not found");
        assert_eq!(err.to_string(), "not found: Method 'foo' not found");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"kind": "notFound", "message": "Method 'foo' not found"})
        );
    }
}
