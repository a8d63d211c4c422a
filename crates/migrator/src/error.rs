//! Error types for the migration engine
//!
//! Every variant records the operation that produced it (`op`), so the
//! message reaching the top-level caller reads like
//! `migrator.execute_scripts: script 0003 (up) failed: ...`.

use std::path::PathBuf;

use thiserror::Error;

use crate::definitions::Direction;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Error kinds produced while resolving, planning or applying migrations
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Connectivity or query failure against the database
    #[error("{op}: storage error: {source}")]
    Storage {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// The history table exists but holds no rows
    #[error("{op}: history table '{table}' has no records")]
    NotFound { op: &'static str, table: String },

    /// Directory listing or script read failure
    #[error("{op}: {}: {source}", .path.display())]
    FileSystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A script reached the database and was rejected
    #[error("{op}: script {file_number:04} ({direction}) failed: {source}")]
    Execution {
        op: &'static str,
        file_number: u32,
        direction: Direction,
        #[source]
        source: sqlx::Error,
    },

    /// Inconsistent or unreachable version bounds
    #[error("{op}: {message}")]
    Planning { op: &'static str, message: String },

    /// Invalid migrator configuration
    #[error("{op}: configuration error: {message}")]
    Configuration { op: &'static str, message: String },
}

impl MigrationError {
    pub(crate) fn storage(op: &'static str, source: sqlx::Error) -> Self {
        MigrationError::Storage { op, source }
    }

    pub(crate) fn file_system(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrationError::FileSystem {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn planning(op: &'static str, message: impl Into<String>) -> Self {
        MigrationError::Planning {
            op,
            message: message.into(),
        }
    }

    pub(crate) fn configuration(op: &'static str, message: impl Into<String>) -> Self {
        MigrationError::Configuration {
            op,
            message: message.into(),
        }
    }

    /// Name of the operation that produced the error
    pub fn operation(&self) -> &'static str {
        match self {
            MigrationError::Storage { op, .. }
            | MigrationError::NotFound { op, .. }
            | MigrationError::FileSystem { op, .. }
            | MigrationError::Execution { op, .. }
            | MigrationError::Planning { op, .. }
            | MigrationError::Configuration { op, .. } => *op,
        }
    }

    /// File number of the failing script, for execution errors
    pub fn failed_file(&self) -> Option<u32> {
        match self {
            MigrationError::Execution { file_number, .. } => Some(*file_number),
            _ => None,
        }
    }
}
