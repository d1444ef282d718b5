//! Maestro Core — transport-agnostic orchestration engine for the
//! Maestro multi-agent workflow platform.
//!
//! This crate contains the domain logic: workflow definitions and
//! validation, the dependency-graph execution engine, the agent registry
//! with mention routing and delegation, the tool-call permission gate,
//! the checkpoint controller, review-panel consensus, and a JSON-RPC
//! dispatcher. It has **no HTTP framework dependency**, making it
//! suitable for use in:
//!
//! - HTTP servers
//! - Desktop apps (direct IPC)
//! - CLI tools

pub mod checkpoint;
pub mod consensus;
pub mod db;
pub mod error;
pub mod events;
pub mod gate;
pub mod models;
pub mod registry;
pub mod rpc;
pub mod state;
pub mod store;
pub mod workflow;

// Convenience re-exports
pub use db::Database;
pub use error::CoreError;
pub use state::{AppState, AppStateInner};
