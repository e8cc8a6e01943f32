//! Error types for the UI runtime.

use bridge_types::{ControllerId, RemoteError};

/// Errors that can occur in the UI runtime.
#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error("UI runtime has terminated")]
    Terminated,

    #[error("Channel closed")]
    ChannelClosed,

    #[error("UI runtime thread panicked")]
    ThreadPanic,

    #[error("Failed to spawn thread: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("No mirror for controller {0}")]
    ControllerNotFound(ControllerId),

    #[error("Host call failed: {0}")]
    Remote(#[from] RemoteError),
}
