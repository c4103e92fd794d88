//! Error types for the restack core library
//!
//! Defines the error taxonomy shared by the transport, the decorators and
//! the response holder, using thiserror for ergonomic error definitions and
//! anyhow for flexible source contexts.

use thiserror::Error;

/// Main error type for restack operations
#[derive(Error, Debug)]
pub enum Error {
    /// Non-success HTTP status observed (outside 200-299 and not 302).
    ///
    /// Carries enough context for decorators to branch on it: the caching
    /// decorator converts 400/404 into negative cache entries, the retrying
    /// decorator consults the status for its retriable table.
    #[error("HTTP status {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },

    /// Transport-level failure (DNS, connection refused, I/O) distinct from
    /// a valid HTTP response. Always classified as retriable.
    #[error("Connection failed: {message}")]
    Connect {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Malformed URL or incompatible usage of a client. Never retried,
    /// never cached.
    #[error("Invalid argument: {message}")]
    Argument {
        message: String,
    },

    /// A response body could not be decoded into the requested type.
    #[error("Decode failed: {message}")]
    Decode {
        message: String,
    },

    /// A cache store failed to read or write an entry.
    #[error("Cache store error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The retry loop exited without resolving to either a success or an
    /// error. Unreachable by construction; signals a logic defect if hit.
    #[error("Invariant violation: {message}")]
    Invariant {
        message: String,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The HTTP status code, when this error was produced by one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Argument {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Error::Argument {
                message: err.to_string(),
            }
        } else {
            Error::Connect {
                message: err.to_string(),
                source: Some(anyhow::Error::new(err)),
            }
        }
    }
}
