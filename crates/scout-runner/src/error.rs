//! Error types for bulk runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors returned to the caller of a run.
///
/// Everything that goes wrong inside a run is recorded per source as a
/// [`SourceFailure`]; only these escape.
#[derive(Debug, Error)]
pub enum RunError {
    /// `run()` was called while another run was in progress
    #[error("a run is already in progress")]
    AlreadyRunning,

    /// A sink rejected a write
    #[error("sink error: {0}")]
    Sink(String),

    /// The SQLite store failed
    #[error("database error: {0}")]
    Database(#[from] scout_db::DatabaseError),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunError>;

/// Category of a per-source failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The source exceeded its deadline
    Timeout,
    /// The adapter's stream yielded an error
    Adapter,
    /// Persisting the source's records failed
    Sink,
    /// The requested source id is not registered
    UnknownSource,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::Adapter => "adapter error",
            Self::Sink => "sink error",
            Self::UnknownSource => "unknown source",
        };
        write!(f, "{s}")
    }
}

/// Why a single source failed within a run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct SourceFailure {
    /// Category
    pub kind: FailureKind,
    /// Human-readable detail
    pub message: String,
}

impl SourceFailure {
    /// Create a failure of the given kind.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
