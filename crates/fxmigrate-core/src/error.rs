//! Error types for the migration engine.
//!
//! Ineligible projects and declined confirmations are not errors; they are
//! reported through [`crate::MigrationOutcome`]. Everything here aborts the
//! attempt and triggers rollback.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::document::DocumentError;

/// Main error type for the migration engine.
#[derive(Debug, Error)]
pub enum MigrationError {
    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Failed to parse {path:?}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },

    #[error("YAML error: {message}")]
    Yaml {
        message: String,
        #[source]
        source: Option<serde_yaml::Error>,
    },

    // Project errors
    #[error("Malformed project: {message}")]
    MalformedProject { message: String },

    #[error("Secret encryption failed for {key}: {message}")]
    Encryption { key: String, message: String },

    #[error("Migration cancelled by user")]
    UserCancelled,

    #[error("Internal error in step '{step}': {message}")]
    Internal { step: String, message: String },

    #[error("Rollback incomplete after '{cause}'; {} path(s) could not be restored", .failed_paths.len())]
    RollbackFailed {
        cause: Box<MigrationError>,
        failed_paths: Vec<PathBuf>,
    },
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;

impl From<std::io::Error> for MigrationError {
    fn from(err: std::io::Error) -> Self {
        MigrationError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(err: serde_json::Error) -> Self {
        MigrationError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_yaml::Error> for MigrationError {
    fn from(err: serde_yaml::Error) -> Self {
        MigrationError::Yaml {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl MigrationError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        MigrationError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        MigrationError::MalformedProject {
            message: message.into(),
        }
    }

    /// Whether the error already carries a user-facing classification.
    pub fn is_classified(&self) -> bool {
        matches!(
            self,
            MigrationError::MalformedProject { .. }
                | MigrationError::Encryption { .. }
                | MigrationError::Internal { .. }
                | MigrationError::UserCancelled
                | MigrationError::RollbackFailed { .. }
        )
    }

    /// Pass classified errors through; wrap everything else as an internal
    /// error attributed to `step`.
    pub fn classify(self, step: &str) -> Self {
        if self.is_classified() {
            self
        } else {
            MigrationError::Internal {
                step: step.to_string(),
                message: self.to_string(),
            }
        }
    }

    /// Process exit code for command-line front ends.
    ///
    /// - 2: malformed project
    /// - 3: cancelled by user
    /// - 4: rollback incomplete
    /// - 1: everything else
    pub fn to_exit_code(&self) -> i32 {
        match self {
            MigrationError::MalformedProject { .. } => 2,
            MigrationError::UserCancelled => 3,
            MigrationError::RollbackFailed { .. } => 4,
            _ => 1,
        }
    }
}

/// Attach a path to IO errors.
pub trait IoResultExt<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| MigrationError::io_with_path(e, path.as_ref()))
    }
}
