//! Runtime spawn function.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;

use bridge_types::HostBoundary;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::error::UiError;
use crate::handle::UiRuntimeHandle;
use crate::runtime::{UiOptions, UiRuntime};
use crate::worker::run_worker;

/// Spawn a UI runtime on its own thread.
///
/// The thread runs a current-thread tokio runtime, so mirror state is only
/// ever touched from one place.
pub fn spawn_ui_runtime(
    name: String,
    link: Arc<dyn HostBoundary>,
    options: UiOptions,
) -> Result<UiRuntimeHandle, UiError> {
    tracing::debug!("[spawn_ui_runtime] Starting {}", name);

    let terminated = Arc::new(AtomicBool::new(false));
    let terminated_clone = terminated.clone();

    // Command channel
    let (cmd_tx, cmd_rx) = mpsc::channel(32);

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let name_clone = name.clone();
    let thread_handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || -> Result<(), UiError> {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(UiError::SpawnFailed)?;

            let runtime = UiRuntime::new(link, options);
            let result = rt.block_on(run_worker(
                name_clone.clone(),
                runtime,
                terminated_clone,
                cmd_rx,
                shutdown_rx,
            ));

            rt.shutdown_background();
            tracing::debug!("[spawn_ui_runtime:{}] Thread exiting", name_clone);
            result
        })?;

    tracing::debug!("[spawn_ui_runtime] {} is ready", name);

    Ok(UiRuntimeHandle {
        cmd_tx,
        shutdown_tx,
        terminated,
        thread_handle: Mutex::new(Some(thread_handle)),
    })
}
