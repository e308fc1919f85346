//! Error types for disease-tree

use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;

/// Rebuild error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Hierarchy node has no metadata row
    NotFound,
    /// Edge relation revisits a node already on the traversal path
    CycleDetected,
    /// Read or write against the relational store failed
    StoreUnavailable,
    /// Duplicate primary key or count mismatch in the staged index
    ConstraintViolation,
    /// Configuration errors
    Config,
    /// I/O errors
    IO,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::CycleDetected => "cycle_detected",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::ConstraintViolation => "constraint_violation",
            ErrorKind::Config => "config",
            ErrorKind::IO => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Index rebuild error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct IndexError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl IndexError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn not_found(node_id: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::NotFound,
            format!("Hierarchy node has no metadata: {}", node_id.into()),
        )
    }

    /// `path` is the root-to-node path ending in the revisited id.
    pub fn cycle_detected(path: &[String]) -> Self {
        Self::new(
            ErrorKind::CycleDetected,
            format!("Cycle in hierarchy: {}", path.join(" -> ")),
        )
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StoreUnavailable, message)
    }

    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConstraintViolation, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }
}

// SQLite error conversions
#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        if err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) {
            IndexError::constraint_violation(format!("SQLite constraint: {}", err)).with_source(err)
        } else {
            IndexError::store_unavailable(format!("SQLite error: {}", err)).with_source(err)
        }
    }
}

impl From<ConfigError> for IndexError {
    fn from(err: ConfigError) -> Self {
        IndexError::config(err.to_string()).with_source(err)
    }
}

impl From<std::io::Error> for IndexError {
    fn from(err: std::io::Error) -> Self {
        IndexError::new(ErrorKind::IO, format!("IO error: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, IndexError>;
