//! Error types for isto.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type IstoResult<T> = Result<T, IstoError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum IstoError {
    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error from the SQL index.
    #[error("index error: {0}")]
    Index(#[from] rusqlite::Error),

    /// A stored timestamp string could not be decoded.
    #[error("timestamp error: {0}")]
    Timestamp(#[from] isto_timefmt::TimeFmtError),

    /// Another store instance holds the index of this tier directory.
    #[error("store locked: another instance holds {directory}")]
    StoreLocked {
        /// The contended tier directory.
        directory: String,
    },

    /// A declared tag name cannot be used as an index column.
    #[error("invalid tag name {name:?}: tag names must not contain whitespace or quotes")]
    InvalidTagName {
        /// The offending tag name.
        name: String,
    },

    /// An item id cannot be used as a file name.
    #[error("invalid item id {id:?}: ids must be non-empty and free of path separators and whitespace")]
    InvalidId {
        /// The offending id.
        id: String,
    },

    /// A non-upsert save hit files that already exist.
    ///
    /// Index rows written for the other items of the same batch are
    /// retained; the already-existing files are not disturbed.
    #[error("data item file(s) already exist: {}", paths.join(", "))]
    DuplicateItems {
        /// Paths of the files that already existed.
        paths: Vec<String>,
    },
}

impl IstoError {
    /// Creates a store-locked error for a tier directory.
    pub fn store_locked(directory: impl Into<String>) -> Self {
        Self::StoreLocked {
            directory: directory.into(),
        }
    }

    /// Creates an invalid tag name error.
    pub fn invalid_tag_name(name: impl Into<String>) -> Self {
        Self::InvalidTagName { name: name.into() }
    }

    /// Creates an invalid item id error.
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId { id: id.into() }
    }

    /// Creates a duplicate-items error from the offending paths.
    pub fn duplicate_items(paths: Vec<String>) -> Self {
        Self::DuplicateItems { paths }
    }
}
