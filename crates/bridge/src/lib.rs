//! Bridge - controller binding between a UI and a host process
//!
//! This crate wires the bridge crates into a runnable program:
//! - Configuration loading
//! - The framed IPC protocol and its host-side server
//! - Demo controllers and an in-process loopback session

// Re-export core crates
pub use bridge_runtime;
pub use bridge_types;
pub use bridge_ui;

// Configuration
pub mod config;

// Wire protocol
pub mod ipc;

// Host-side IPC server
pub mod server;

// Demo controllers
pub mod demo;
