//! Thread-safe handle to a spawned UI runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use bridge_types::{CallResult, ControllerChange, ControllerId};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use crate::command::{ScopeEdit, UiCommand};
use crate::error::UiError;
use crate::scope::Scope;

/// Handle to a spawned UI runtime.
///
/// Every operation is a command to the worker thread; the reply arrives once
/// the worker has run it (and the digest that follows mutating commands).
pub struct UiRuntimeHandle {
    pub(crate) cmd_tx: mpsc::Sender<UiCommand>,
    pub(crate) shutdown_tx: watch::Sender<bool>,
    pub(crate) terminated: Arc<AtomicBool>,
    pub(crate) thread_handle: Mutex<Option<thread::JoinHandle<Result<(), UiError>>>>,
}

impl UiRuntimeHandle {
    /// Helper to send a command and wait for reply.
    async fn send_command<T, F>(&self, make_cmd: F) -> Result<T, UiError>
    where
        F: FnOnce(oneshot::Sender<Result<T, UiError>>) -> UiCommand,
    {
        if self.terminated.load(Ordering::SeqCst) {
            return Err(UiError::Terminated);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(make_cmd(reply_tx))
            .await
            .map_err(|_| UiError::ChannelClosed)?;

        reply_rx.await.map_err(|_| UiError::ChannelClosed)?
    }

    /// Bind a host controller by name.
    pub async fn create_controller(&self, name: &str) -> Result<ControllerId, UiError> {
        let name = name.to_string();
        self.send_command(|reply| UiCommand::CreateController { name, reply })
            .await
    }

    /// Release a bound controller.
    pub async fn destroy_controller(&self, id: ControllerId) -> Result<bool, UiError> {
        self.send_command(|reply| UiCommand::DestroyController { id, reply })
            .await
    }

    /// Invoke a host method.
    pub async fn call_method(
        &self,
        id: ControllerId,
        name: &str,
        args: Vec<Value>,
    ) -> Result<CallResult, UiError> {
        let name = name.to_string();
        self.send_command(|reply| UiCommand::CallMethod {
            id,
            name,
            args,
            reply,
        })
        .await
    }

    /// Edit a mirror locally. The edit is sent to the host by the digest
    /// that follows.
    pub async fn update(
        &self,
        id: ControllerId,
        edit: impl FnOnce(&mut Scope) + Send + 'static,
    ) -> Result<(), UiError> {
        let edit: ScopeEdit = Box::new(edit);
        self.send_command(|reply| UiCommand::Update { id, edit, reply })
            .await
    }

    /// Apply a host-originated batch.
    pub async fn apply_changes(&self, batch: Vec<ControllerChange>) -> Result<(), UiError> {
        self.send_command(|reply| UiCommand::ApplyChanges { batch, reply })
            .await
    }

    /// Current values of a mirror as one JSON object.
    pub async fn snapshot(&self, id: ControllerId) -> Result<Value, UiError> {
        self.send_command(|reply| UiCommand::Snapshot { id, reply })
            .await
    }

    /// Run change detection now; returns how many changes were sent.
    pub async fn digest(&self) -> Result<usize, UiError> {
        self.send_command(|reply| UiCommand::Digest { reply }).await
    }

    /// Terminate the runtime.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
    }

    /// Check if the runtime has terminated.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Wait for the runtime thread to finish.
    pub fn join(self) -> Result<(), UiError> {
        if let Some(handle) = self.thread_handle.lock().take() {
            handle.join().map_err(|_| UiError::ThreadPanic)??;
        }
        Ok(())
    }
}

impl Drop for UiRuntimeHandle {
    fn drop(&mut self) {
        self.terminate();
        if let Some(handle) = self.thread_handle.lock().take() {
            let _ = handle.join();
        }
    }
}
