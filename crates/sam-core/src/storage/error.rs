//! Storage error handling
//!
//! Provides typed errors for storage operations with descriptive messages
//! and recovery suggestions.
//!
//! Expected absences are not errors: `read` yields `None`, and `replace` /
//! `delete` yield `false`. The variants here cover genuine failures.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Operation attempted on an engine that is not open
    #[error("Storage engine is not connected. Call open() first.")]
    NotConnected,

    /// The engine's open() reported failure
    #[error("Failed to open {backend} storage")]
    OpenFailed { backend: String },

    /// A document that was expected to exist is missing
    #[error("SAM with key {key} not found")]
    NotFound { key: String },

    /// The factory has no backend registered under this tag
    #[error("Unknown storage backend '{tag}'")]
    UnknownBackend { tag: String },

    /// A freshly generated key is already taken
    #[error("Key collision: a SAM with key {key} already exists")]
    KeyCollision { key: String },

    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error(
        "Disk full or quota exceeded while writing to '{path}'. Free up disk space and try again."
    )]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A stored row could not be turned back into a document
    #[error("Invalid record for key {key}: {details}")]
    InvalidRecord { key: String, details: String },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Body could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Background storage task panicked or was cancelled
    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StorageError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.)
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                path,
                source: error,
            },
            _ if is_disk_full_error(&error) => StorageError::DiskFull {
                path,
                source: error,
            },
            _ => StorageError::CreateDirectory {
                path,
                source: error,
            },
        }
    }

    /// Classify a SQLite error raised while inserting a given key
    pub fn from_write(error: rusqlite::Error, key: &str) -> Self {
        match error {
            rusqlite::Error::SqliteFailure(ref e, _)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                StorageError::KeyCollision {
                    key: key.to_string(),
                }
            }
            other => StorageError::Database(other),
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StorageError::DiskFull { .. }
                | StorageError::PermissionDenied { .. }
                | StorageError::NotConnected
                | StorageError::OpenFailed { .. }
                | StorageError::KeyCollision { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::DiskFull { .. } => Some("Free up disk space and try again."),
            StorageError::PermissionDenied { .. } => {
                Some("Check file and directory permissions. You may need to run with different permissions or change ownership.")
            }
            StorageError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            StorageError::NotConnected => Some("Open the storage engine before using it."),
            StorageError::OpenFailed { .. } => {
                Some("Check that the data directory is writable and not locked by another process.")
            }
            StorageError::KeyCollision { .. } => Some("Retry the operation to get a fresh key."),
            StorageError::UnknownBackend { .. } => {
                Some("Set `backend` to one of the registered backends (sqlite, memory).")
            }
            _ => None,
        }
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
