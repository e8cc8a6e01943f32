//! Error types for the host runtime.

use bridge_types::{ControllerId, ErrorKind, PatchError, RemoteError};

use crate::decode::WireKind;

/// Errors raised while resolving or invoking a controller method
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Method '{method}' not found on controller '{controller}'")]
    MethodNotFound { method: String, controller: String },

    #[error(
        "Method '{method}' on controller '{controller}' takes {expected} arguments, got {actual}"
    )]
    ParameterCountMismatch {
        method: String,
        controller: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "Argument {index} of '{controller}.{method}' expects {expected}, got {actual}"
    )]
    ParameterMismatch {
        index: usize,
        expected: String,
        actual: WireKind,
        method: String,
        controller: String,
    },

    #[error("Return value of '{method}' could not be serialized: {source}")]
    ReturnEncoding {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invocation of '{method}' failed: {message}")]
    Invocation { method: String, message: String },
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DispatchError::MethodNotFound { .. } => ErrorKind::NotFound,
            DispatchError::ParameterCountMismatch { .. } => ErrorKind::ArityMismatch,
            DispatchError::ParameterMismatch { .. } => ErrorKind::ArgumentTypeMismatch,
            DispatchError::ReturnEncoding { .. } | DispatchError::Invocation { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

/// Errors raised by the controller host
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Controller {0} not found")]
    ControllerNotFound(ControllerId),

    #[error("No controller type named '{0}' is registered")]
    UnknownController(String),

    #[error("Controller {id} is not a {expected}")]
    WrongType { id: ControllerId, expected: &'static str },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Collection patch failed: {0}")]
    Patch(#[from] PatchError),

    #[error("Background call failed: {0}")]
    TaskFailed(String),
}

impl HostError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HostError::ControllerNotFound(_) => ErrorKind::ControllerNotFound,
            HostError::UnknownController(_) => ErrorKind::NotFound,
            HostError::Dispatch(e) => e.kind(),
            HostError::Patch(_) => ErrorKind::InvalidArgument,
            HostError::WrongType { .. } | HostError::TaskFailed(_) => ErrorKind::Internal,
        }
    }
}

impl From<DispatchError> for RemoteError {
    fn from(err: DispatchError) -> Self {
        RemoteError::new(err.kind(), err.to_string())
    }
}

impl From<HostError> for RemoteError {
    fn from(err: HostError) -> Self {
        RemoteError::new(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_mismatch_names_the_argument() {
        let err = DispatchError::ParameterMismatch {
            index: 1,
            expected: "i32".to_string(),
            actual: WireKind::String,
            method: "Add".to_string(),
            controller: "Counter".to_string(),
        };
        assert_eq!(err.to_string(), "Argument 1 of 'Counter.Add' expects i32, got string");

        let remote = RemoteError::from(err);
        assert_eq!(remote.kind, ErrorKind::ArgumentTypeMismatch);
    }

    #[test]
    fn test_host_error_kinds() {
        assert_eq!(HostError::ControllerNotFound(3).kind(), ErrorKind::ControllerNotFound);
        assert_eq!(
            HostError::from(DispatchError::InvalidArgument("blank".into())).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            RemoteError::from(HostError::UnknownController("Nope".into())).kind,
            ErrorKind::NotFound
        );
    }
}
