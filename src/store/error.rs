//! Error types for row storage.

use std::path::PathBuf;

use thiserror::Error;

use super::RowKind;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row with the given key exists.
    #[error("{kind} '{key}' not found")]
    NotFound {
        /// Table that was searched.
        kind: RowKind,
        /// Key that was looked up.
        key: String,
    },

    /// A create collided with an existing row.
    #[error("{kind} '{key}' already exists")]
    AlreadyExists {
        /// Table of the colliding row.
        kind: RowKind,
        /// Key that is already taken.
        key: String,
    },

    /// An update was based on a stale version of the row.
    ///
    /// The caller should re-read the row and try again.
    #[error("{kind} '{key}' was modified concurrently (expected version {expected})")]
    Conflict {
        /// Table of the contested row.
        kind: RowKind,
        /// Key of the contested row.
        key: String,
        /// Version the writer read the row at.
        expected: u64,
    },

    /// A row could not be encoded.
    #[error("Failed to serialize {kind} row: {source}")]
    Serialize {
        /// Table of the row being encoded.
        kind: RowKind,
        /// The underlying encoding error.
        #[source]
        source: serde_json::Error,
    },

    /// A stored row could not be decoded.
    #[error("Failed to deserialize {kind} '{key}': {source}")]
    Deserialize {
        /// Table of the row being decoded.
        kind: RowKind,
        /// Key of the row being decoded.
        key: String,
        /// The underlying decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to write the data file.
    #[error("Failed to write data file: {0}")]
    Write(#[source] std::io::Error),

    /// Failed to read the data file.
    #[error("Failed to read data file {path}: {source}")]
    Read {
        /// Path of the data file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The data file exists but cannot be used.
    #[error("Data file {path} is corrupted: {reason}")]
    Corrupted {
        /// Path of the data file.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// A previous writer panicked while holding the store lock.
    #[error("Store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Returns `true` if retrying the operation after a fresh read may succeed.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
