//! Client error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by [`Session`](crate::Session) operations.
///
/// The first four variants are derived from the HTTP status of a service
/// response, always through [`Error::from_status`]. `Transport` is not
/// status-derived: it covers connection and timeout failures reported by the
/// HTTP stack, and is surfaced as-is, never retried here.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input or a disallowed operation shape.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authenticated but not permitted, or acting identity mismatch.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success status, carrying the raw code.
    #[error("unexpected status {status}: {context}")]
    Unexpected { status: StatusCode, context: String },

    /// Connection, TLS or timeout failure below the HTTP layer.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A 2xx response whose body or headers do not match the protocol.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Map a non-success status to its error kind. Every operation funnels
    /// its failures through here; none invents its own mapping.
    pub fn from_status(status: StatusCode, context: impl Into<String>) -> Self {
        let context = context.into();
        match status {
            StatusCode::BAD_REQUEST => Self::BadRequest(context),
            StatusCode::FORBIDDEN => Self::Forbidden(context),
            StatusCode::NOT_FOUND => Self::NotFound(context),
            _ => Self::Unexpected { status, context },
        }
    }

    /// Check if this is a "bad request" error
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest(_))
    }

    /// Check if this is a "forbidden" error
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(Error::from_status(StatusCode::BAD_REQUEST, "x").is_bad_request());
        assert!(Error::from_status(StatusCode::FORBIDDEN, "x").is_forbidden());
        assert!(Error::from_status(StatusCode::NOT_FOUND, "x").is_not_found());

        match Error::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom") {
            Error::Unexpected { status, context } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(context, "boom");
            }
            other => panic!("expected Unexpected, got {other:?}"),
        }
    }

    #[test]
    fn context_appears_in_message() {
        let err = Error::from_status(StatusCode::NOT_FOUND, "blob 00ff in holiday");
        assert_eq!(err.to_string(), "not found: blob 00ff in holiday");
    }
}
