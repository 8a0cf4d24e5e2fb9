//! Error types for trailmap-core.
//!
//! # Recovery
//!
//! | Error Type | Strategy | Rationale |
//! |------------|----------|-----------|
//! | [`Error::Storage`] from an open-time failure | Do not retry | The store instance is unusable |
//! | [`Error::Storage`] from a per-operation failure | Retry | Disk pressure or lock contention is usually transient |
//! | [`Error::StoreDiverged`] | Retry [`reset`](crate::TrackingSession::reset) | The view is cleared but the durable history is not |
//! | [`Error::SourceUnavailable`] | Fix the source, then `start` again | Permission denied or hardware missing |
//! | [`Error::InvalidState`] | Do not retry | The caller misused the state machine |
//! | [`Error::InvalidConfig`] | Do not retry | Fix configuration and restart |
//!
//! None of these terminate the session; a failed persist leaves it
//! tracking and the next fix is processed normally.

use thiserror::Error;

use crate::session::TrackingState;

/// Errors that can occur while running a tracking session.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The location store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] trailmap_store::Error),

    /// The in-memory projection was cleared but clearing the store failed.
    #[error("History cleared in memory but not on disk: {0}")]
    StoreDiverged(#[source] trailmap_store::Error),

    /// The location source could not start delivering fixes.
    #[error("Location source unavailable: {0}")]
    SourceUnavailable(String),

    /// Operation is not valid in the session's current state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The state the session was in.
        state: TrackingState,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A background task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl Error {
    /// Create a source unavailable error.
    pub fn source_unavailable(reason: impl Into<String>) -> Self {
        Self::SourceUnavailable(reason.into())
    }

    /// Create an invalid state error.
    pub fn invalid_state(operation: &'static str, state: TrackingState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether the caller may retry the failed operation.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Storage(e) | Self::StoreDiverged(e) => e.is_recoverable(),
            Self::SourceUnavailable(_) => true,
            _ => false,
        }
    }
}

/// Result type alias using trailmap-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
