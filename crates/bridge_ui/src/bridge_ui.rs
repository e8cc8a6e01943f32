//! Bridge UI - Script-runtime side of the controller bridge
//!
//! Mirrors host controllers as local scopes, detects local edits, and applies
//! host-originated change batches without echoing them back.
//!
//! # Architecture
//!
//! - [`Scope`] holds a mirror's values with assignment revisions
//! - [`ChangeTracker`] turns scope edits into [`ControllerChange`]s
//! - [`UiRuntime`] owns the mirrors and talks to the host through a
//!   [`HostBoundary`] link
//! - [`spawn_ui_runtime`] runs a `UiRuntime` on its own thread; the returned
//!   [`UiRuntimeHandle`] is the async, thread-safe front
//!
//! [`ControllerChange`]: bridge_types::ControllerChange
//! [`HostBoundary`]: bridge_types::HostBoundary

mod command;
mod error;
mod handle;
mod runtime;
mod scope;
mod spawn;
pub mod sync;
mod tracker;
mod worker;

pub use error::UiError;
pub use handle::UiRuntimeHandle;
pub use runtime::{ControllerMirror, UiOptions, UiRuntime, WARM_UP};
pub use scope::Scope;
pub use spawn::spawn_ui_runtime;
pub use tracker::ChangeTracker;
