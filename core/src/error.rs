//! Error types for the portal core.
//!
//! # Design
//! Every failure an operator action can meet is an `ApiError` value. The
//! interpreter and the session controller turn transport faults, backend
//! errors, shape mismatches and missing parameters into one of the four
//! variants, so the UI always has a status (when there is one) and a message
//! to show.

use thiserror::Error;

/// Synthetic status reported when the backend could not be reached at all.
pub const STATUS_UNREACHABLE: u16 = 0;

/// Failure half of an `OperationResult`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Transport-level failure: connection refused, DNS, timeout.
    #[error("backend unreachable: {reason}")]
    Unreachable { reason: String },

    /// The backend answered with a status of 400 or above.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// A successful status whose body does not have the expected shape.
    #[error("malformed response: {reason}")]
    MalformedResponse { status: u16, reason: String },

    /// The operation was rejected before dispatch.
    #[error("unsupported request: {reason}")]
    Unsupported { reason: String },
}

impl ApiError {
    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        ApiError::Unsupported {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(status: u16, reason: impl Into<String>) -> Self {
        ApiError::MalformedResponse {
            status,
            reason: reason.into(),
        }
    }

    /// Numeric status shown to the operator, if the failure has one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unreachable { .. } => Some(STATUS_UNREACHABLE),
            ApiError::Http { status, .. } | ApiError::MalformedResponse { status, .. } => {
                Some(*status)
            }
            ApiError::Unsupported { .. } => None,
        }
    }

    /// True when the request never produced an HTTP response.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ApiError::Unreachable { .. })
    }
}

/// Errors raised while building a `Configuration`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("base URL must not be empty")]
    EmptyBaseUrl,

    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("base URL {url:?} must use http or https, not {scheme}")]
    UnsupportedScheme { url: String, scheme: String },
}

/// Failure reported by a `Transport` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("{0}")]
    Other(String),
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Unreachable {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_carries_synthetic_status() {
        let err = ApiError::from(TransportError::Connection("refused".to_string()));
        assert_eq!(err.status(), Some(STATUS_UNREACHABLE));
        assert!(err.is_unreachable());
        assert_eq!(err.to_string(), "backend unreachable: connection failed: refused");
    }

    #[test]
    fn timeout_maps_to_unreachable() {
        let err = ApiError::from(TransportError::Timeout(std::time::Duration::from_secs(2)));
        assert!(err.is_unreachable());
    }

    #[test]
    fn http_error_displays_message_only() {
        let err = ApiError::Http {
            status: 404,
            message: "not found".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "not found");
    }

    #[test]
    fn malformed_display_names_the_reason() {
        let err = ApiError::malformed(200, "missing field `id`");
        assert_eq!(err.to_string(), "malformed response: missing field `id`");
        assert_eq!(err.status(), Some(200));
    }

    #[test]
    fn unsupported_has_no_status() {
        assert_eq!(ApiError::unsupported("year is required").status(), None);
    }
}
