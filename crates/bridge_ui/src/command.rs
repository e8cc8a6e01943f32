//! Commands sent to the UI worker thread.

use bridge_types::{CallResult, ControllerChange, ControllerId};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::UiError;
use crate::scope::Scope;

/// Local edit run against a mirror's scope on the worker thread
pub(crate) type ScopeEdit = Box<dyn FnOnce(&mut Scope) + Send>;

/// Commands for the UI worker.
pub(crate) enum UiCommand {
    /// Bind a new host controller.
    CreateController {
        name: String,
        reply: oneshot::Sender<Result<ControllerId, UiError>>,
    },

    /// Release a bound controller.
    DestroyController {
        id: ControllerId,
        reply: oneshot::Sender<Result<bool, UiError>>,
    },

    /// Invoke a host method.
    CallMethod {
        id: ControllerId,
        name: String,
        args: Vec<Value>,
        reply: oneshot::Sender<Result<CallResult, UiError>>,
    },

    /// Edit a mirror locally.
    Update {
        id: ControllerId,
        edit: ScopeEdit,
        reply: oneshot::Sender<Result<(), UiError>>,
    },

    /// Apply a host-originated batch.
    ApplyChanges {
        batch: Vec<ControllerChange>,
        reply: oneshot::Sender<Result<(), UiError>>,
    },

    /// Read a mirror's current values as one JSON object.
    Snapshot {
        id: ControllerId,
        reply: oneshot::Sender<Result<Value, UiError>>,
    },

    /// Run change detection now.
    Digest {
        reply: oneshot::Sender<Result<usize, UiError>>,
    },
}

impl UiCommand {
    /// Whether the command can leave local edits behind
    pub(crate) fn mutates(&self) -> bool {
        !matches!(self, UiCommand::Snapshot { .. } | UiCommand::Digest { .. })
    }
}
