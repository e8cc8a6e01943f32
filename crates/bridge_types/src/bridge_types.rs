//! Bridge Types - Wire model shared by the host and the UI runtime
//!
//! This crate contains the pure data structures that cross the host/UI
//! boundary: controller descriptions, change batches, collection actions and
//! the structured error returned to remote callers. It also holds the pure
//! algorithms both sides share (name-case translation and collection
//! diff/patch) so the two ends can never disagree about them.
//!
//! ## Features
//!
//! - `wasm` - Enable WASM bindings via wasm-bindgen

mod boundary;
pub mod collection;
pub mod naming;
mod wire;

#[cfg(feature = "wasm")]
mod wasm;

pub use boundary::*;
pub use collection::PatchError;
pub use naming::{to_camel, to_pascal};
pub use wire::*;
