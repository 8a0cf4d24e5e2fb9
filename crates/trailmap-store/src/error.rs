//! Error types for trailmap-store.

use std::path::PathBuf;

/// Result type for trailmap-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in trailmap-store.
///
/// Open-time failures ([`Error::CreateDirectory`], [`Error::Unavailable`],
/// [`Error::SchemaMismatch`], [`Error::InvalidKey`]) make the store instance
/// unusable. Everything
/// else is a per-operation failure the caller may retry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The database could not be opened or its schema could not be created.
    #[error("Storage unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// An existing table does not have the expected columns.
    #[error("Table {table} is missing columns: {}", missing.join(", "))]
    SchemaMismatch {
        table: &'static str,
        missing: Vec<&'static str>,
    },

    /// An existing table's id column cannot hold store-assigned ids.
    #[error("Column {table}.{column} must be an INTEGER PRIMARY KEY, found {found}")]
    InvalidKey {
        table: &'static str,
        column: &'static str,
        found: String,
    },

    /// Database error from SQLite during an operation.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Update of a sample whose row no longer exists.
    #[error("Sample not found: {0}")]
    SampleNotFound(i64),
}

impl Error {
    /// Whether this error happened while opening the store.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::CreateDirectory { .. }
                | Self::Unavailable { .. }
                | Self::SchemaMismatch { .. }
                | Self::InvalidKey { .. }
        )
    }

    /// Whether retrying the operation on the same store may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Io(_))
    }
}
