//! Error types and handling
//!
//! This module provides the error taxonomy used throughout the Yojana engine.
//! All errors implement the `ErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! Only catastrophic failures surface through these variants: an unreadable
//! catalog, an unreachable profile store, invalid configuration, or a profile
//! invariant violation inside the contradiction detector. Per-action tool
//! failures are absorbed by the executor and never become an `EngineError`.

use thiserror::Error;

/// Trait for engine error extensions
///
/// Provides additional context for errors, including user-friendly hints and
/// recoverability information.
pub trait ErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain secrets
    /// or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors abort session startup with an operator-facing diagnostic.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Scheme catalog errors (startup only; the catalog is read-only afterwards)
    #[error("Catalog error: {0}")]
    Catalog(String),

    // Profile store errors
    #[error("Profile store error: {0}")]
    ProfileStore(String),

    // Contradiction detector invariant: two values claimed for one attribute
    // after merge. Fatal to the merge call; indicates a detector bug.
    #[error("Profile invariant violated for attribute '{attribute}'")]
    ProfileInvariant { attribute: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

impl ErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            EngineError::Config(_) => "Check ~/.yojana/config.toml for invalid values",
            EngineError::Catalog(_) => "Verify the scheme catalog file exists and is valid JSON",
            EngineError::ProfileStore(_) => "Verify the data directory is writable",
            EngineError::ProfileInvariant { .. } => {
                "Internal error while updating your details; please repeat your last message"
            }
            EngineError::SessionNotFound(_) => "Start a new conversation",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            EngineError::Config(_) => false,
            EngineError::Catalog(_) => false,
            EngineError::ProfileStore(_) => false,
            EngineError::ProfileInvariant { .. } => true,
            EngineError::SessionNotFound(_) => true,
        }
    }
}
