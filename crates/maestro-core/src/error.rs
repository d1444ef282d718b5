//! Core error type for the Maestro engine.
//!
//! `CoreError` is used throughout the domain (stores, components, RPC).
//! Expected failure paths — delegation, reviewer responses — are reported
//! as result values, not as `CoreError`; this type covers store failures,
//! missing entities, out-of-order transitions, and rejected definitions.

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("No primary agent registered")]
    NoPrimaryAgent,

    #[error("Internal error: {0}")]
    Internal(String),
}
