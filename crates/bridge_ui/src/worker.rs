//! Worker loop for the UI runtime thread.
//!
//! The loop owns the [`UiRuntime`] and processes one command at a time. After
//! each mutating command it runs a digest, which is the single scheduling
//! checkpoint where local edits are batched and sent to the host.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, watch};

use crate::command::UiCommand;
use crate::error::UiError;
use crate::runtime::UiRuntime;

/// The main worker loop that runs inside the spawned thread.
pub(crate) async fn run_worker(
    name: String,
    mut runtime: UiRuntime,
    terminated: Arc<AtomicBool>,
    mut cmd_rx: mpsc::Receiver<UiCommand>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), UiError> {
    tracing::debug!("[ui_worker:{}] Ready", name);

    loop {
        if *shutdown_rx.borrow() || terminated.load(Ordering::SeqCst) {
            tracing::debug!("[ui_worker:{}] Shutdown signal received", name);
            break;
        }

        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    tracing::debug!("[ui_worker:{}] All handles dropped", name);
                    break;
                };
                let mutates = cmd.mutates();
                handle_command(&mut runtime, cmd);
                if mutates {
                    runtime.digest();
                }
            }
        }
    }

    // Release every controller still bound so the host can drop them
    let ids: Vec<_> = runtime.ids().collect();
    for id in ids {
        runtime.destroy_controller(id);
    }

    terminated.store(true, Ordering::SeqCst);
    tracing::debug!("[ui_worker:{}] Stopped", name);
    Ok(())
}

fn handle_command(runtime: &mut UiRuntime, cmd: UiCommand) {
    match cmd {
        UiCommand::CreateController { name, reply } => {
            let _ = reply.send(runtime.create_controller(&name));
        }
        UiCommand::DestroyController { id, reply } => {
            let _ = reply.send(Ok(runtime.destroy_controller(id)));
        }
        UiCommand::CallMethod {
            id,
            name,
            args,
            reply,
        } => {
            let _ = reply.send(runtime.call_method(id, &name, args));
        }
        UiCommand::Update { id, edit, reply } => {
            let _ = reply.send(runtime.update(id, edit));
        }
        UiCommand::ApplyChanges { batch, reply } => {
            runtime.apply_changes(&batch);
            let _ = reply.send(Ok(()));
        }
        UiCommand::Snapshot { id, reply } => {
            let snapshot = runtime
                .mirror(id)
                .map(|mirror| mirror.scope().to_object())
                .ok_or(UiError::ControllerNotFound(id));
            let _ = reply.send(snapshot);
        }
        UiCommand::Digest { reply } => {
            let _ = reply.send(Ok(runtime.digest()));
        }
    }
}
