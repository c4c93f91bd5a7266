//! Query Engine Error Hierarchy
//!
//! Defines the error types surfaced by the engine, categorized by the layer
//! that produced them: configuration, query coordination, transport and
//! persistence.
//!
//! Cancellation is deliberately absent from [`QueryError`]: a cancelled request
//! is never a failure and never reaches a caller as an error.

use std::fmt;
use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Engine configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Query coordination failures (rejected waits, registry misuse)
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Persistent store failures
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The last failure recorded on a query.
///
/// Covers transport failures (network, non-2xx, timeout) and payload
/// validation failures alike; the engine treats both as opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFailure {
    pub message: String,
    /// HTTP-like status code, when the transport produced one
    pub status: Option<u16>,
}

impl QueryFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

impl fmt::Display for QueryFailure {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for QueryFailure {}

#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    /// The fetch a waiter was tied to failed
    #[error("Query failed: {0}")]
    Failed(#[from] QueryFailure),

    /// The query was shut down before a fresh response arrived
    #[error("Query {key} is closed")]
    Closed { key: String },

    /// The key is already bound to a query of a different payload type
    #[error("Query {key} is registered with a different payload type (requested {expected})")]
    TypeMismatch { key: String, expected: &'static str },
}

/// Errors raised by a [`crate::Transport`] implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connection level failures
    #[error("Network error: {0}")]
    Network(String),

    /// The request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The request observed its cancellation token and stopped
    #[error("Request aborted")]
    Aborted,

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Custom backend failures
    #[error("Store backend error: {0}")]
    Backend(String),

    /// Persisted entry could not be encoded or decoded
    #[error(transparent)]
    Codec(#[from] serde_json::Error),

    /// Embedded database errors
    #[error(transparent)]
    Db(#[from] sled::Error),
}

impl From<QueryFailure> for Error {
    fn from(failure: QueryFailure) -> Self {
        Error::Query(QueryError::Failed(failure))
    }
}
