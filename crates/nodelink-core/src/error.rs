//! Error types for the nodelink core library
//!
//! Every failure a connection can produce is a variant of [`Error`]. HTTP
//! failures share one variant and are told apart by their [`FailureKind`],
//! which is the closed taxonomy the classifier maps status codes and response
//! bodies onto.

use std::fmt;
use thiserror::Error;
use serde::{Deserialize, Serialize};

/// Main error type for nodelink operations
#[derive(Error, Debug)]
pub enum Error {
    /// A required construction capability (the multiplexing handle) is absent
    #[error("Missing required capability: {capability}")]
    MissingCapability {
        capability: String,
    },

    /// A required configuration key is absent
    #[error("Missing required configuration key: {key}")]
    MissingConfigKey {
        key: String,
    },

    /// Configuration is present but malformed
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Transport-level failure (DNS, connect, timeout, refused, handle failure)
    #[error("Transport failure ({code}): {message}")]
    Transport {
        code: i32,
        message: String,
    },

    /// The node answered with a status the classifier maps to a failure
    #[error("{message}")]
    Http {
        kind: FailureKind,
        status_code: u16,
        message: String,
    },

    /// The request could not be assembled
    #[error("HTTP request error: {message}")]
    HttpRequest {
        message: String,
    },

    /// A request is already registered on the handle by this connection
    #[error("Connection to {host} already has a request in flight")]
    RequestInFlight {
        host: String,
    },

    /// JSON decoding of a response body failed
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status attached to the failure, if it came from a response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Http { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Failure kind for classified HTTP failures
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Error::Http { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether an outer pool could sensibly retry this against another node
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { .. } => true,
            Error::Http { kind, .. } => kind.is_retryable(),
            _ => false,
        }
    }

    /// Construction-time failures are fatal and never retried
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Error::MissingCapability { .. }
                | Error::MissingConfigKey { .. }
                | Error::Configuration { .. }
        )
    }
}

/// Closed set of HTTP failure kinds produced by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// 400 with an `AlreadyExpiredException` body
    AlreadyExpired,
    /// 403
    Forbidden,
    /// 404
    Missing,
    /// 409
    Conflict,
    /// 400 with a `script_lang not supported` body
    ScriptLangNotSupported,
    /// 500 with a `RoutingMissingException` body
    RoutingMissing,
    /// 500 rejecting a multi-get with no documents
    NoDocumentsToGet,
    /// 500 with a `NoShardAvailableActionException` body
    NoShardAvailable,
    /// Any other 5xx
    ServerError,
}

impl FailureKind {
    /// 5xx kinds may succeed on a different node
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::RoutingMissing
                | FailureKind::NoDocumentsToGet
                | FailureKind::NoShardAvailable
                | FailureKind::ServerError
        )
    }

    /// Whether the kind belongs to the 4xx family
    pub fn is_client_error(&self) -> bool {
        !self.is_retryable()
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::AlreadyExpired => write!(f, "AlreadyExpired"),
            FailureKind::Forbidden => write!(f, "Forbidden"),
            FailureKind::Missing => write!(f, "Missing"),
            FailureKind::Conflict => write!(f, "Conflict"),
            FailureKind::ScriptLangNotSupported => write!(f, "ScriptLangNotSupported"),
            FailureKind::RoutingMissing => write!(f, "RoutingMissing"),
            FailureKind::NoDocumentsToGet => write!(f, "NoDocumentsToGet"),
            FailureKind::NoShardAvailable => write!(f, "NoShardAvailable"),
            FailureKind::ServerError => write!(f, "ServerError"),
        }
    }
}

/// Severity levels attached to lifecycle log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Informational, no action required
    Info,
    /// Warning, should be reviewed
    Warning,
    /// Error, operation failed
    Error,
    /// Critical, the connection cannot be used at all
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display_is_message() {
        let err = Error::Http {
            kind: FailureKind::Missing,
            status_code: 404,
            message: "404 Server Exception: \n{}".to_string(),
        };
        assert_eq!(err.to_string(), "404 Server Exception: \n{}");
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.kind(), Some(FailureKind::Missing));
    }

    #[test]
    fn test_transport_error_display() {
        let err = Error::Transport {
            code: 7,
            message: "Failed to connect".to_string(),
        };
        assert_eq!(err.to_string(), "Transport failure (7): Failed to connect");
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(FailureKind::ServerError.is_retryable());
        assert!(FailureKind::NoShardAvailable.is_retryable());
        assert!(FailureKind::RoutingMissing.is_retryable());
        assert!(FailureKind::NoDocumentsToGet.is_retryable());
        assert!(!FailureKind::Missing.is_retryable());
        assert!(!FailureKind::Conflict.is_retryable());
        assert!(FailureKind::Forbidden.is_client_error());
    }

    #[test]
    fn test_construction_errors_are_not_retryable() {
        let err = Error::MissingConfigKey { key: "host".to_string() };
        assert!(err.is_construction());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Missing required configuration key: host");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Error < Severity::Critical);
        assert_eq!(Severity::Critical.to_string(), "critical");
    }
}
