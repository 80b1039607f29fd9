//! Error types for the source subsystem.

use scout_core::SourceId;
use thiserror::Error;

/// A request that never produced a usable response.
///
/// `status` is `0` for DNS/connect/timeout failures and the HTTP status
/// otherwise, matching the argument of `RateLimiter::handle_block`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transport failure (status {status}): {message}")]
pub struct TransportError {
    /// HTTP status, or 0 when no response arrived
    pub status: u16,
    /// Human-readable cause
    pub message: String,
}

impl TransportError {
    /// A failure with no HTTP response.
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            message: message.into(),
        }
    }
}

/// A page that arrived but could not be understood.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unexpected page structure: {0}")]
pub struct ParseError(pub String);

/// Errors that end an adapter's search.
///
/// Blocking is never an error: it is reported in-band as a `Blocked` signal.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The adapter could not get started (bad configuration, session setup)
    #[error("adapter {source_id} failed: {reason}")]
    Adapter {
        /// Adapter that failed
        source_id: SourceId,
        /// Reason for failure
        reason: String,
    },

    /// A transport failure the adapter chose not to recover from
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A parse failure the adapter chose not to recover from
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The search was cancelled before it could start
    #[error("search cancelled")]
    Cancelled,

    /// Adapter not registered
    #[error("source not found: {0}")]
    NotFound(String),
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::connection("dns lookup failed");
        assert_eq!(err.status, 0);
        assert_eq!(
            err.to_string(),
            "transport failure (status 0): dns lookup failed"
        );
    }

    #[test]
    fn test_source_error_from_parse() {
        let err: SourceError = ParseError("missing results table".to_string()).into();
        assert!(matches!(err, SourceError::Parse(_)));
        assert_eq!(
            err.to_string(),
            "unexpected page structure: missing results table"
        );
    }
}
