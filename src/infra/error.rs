//! Error types for the incident relay infrastructure

use thiserror::Error;

/// Errors that can occur while talking to providers or the payment ledger
#[derive(Error, Debug)]
pub enum RelayError {
    /// Required configuration (credentials, URLs) is missing or invalid
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller supplied an invalid field
    #[error("validation error on {field}: {message}")]
    Validation { field: String, message: String },

    /// Provider answered with a non-success status or could not be reached
    #[error("{provider} request failed{}: {message}", status_suffix(.status))]
    Upstream {
        provider: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// Provider did not answer within the request timeout
    #[error("{provider} request timed out")]
    Timeout { provider: &'static str },

    /// Provider answered with a body we could not decode
    #[error("decode error: {0}")]
    Decode(String),

    /// Requested object does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn upstream(provider: &'static str, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider,
            status,
            message: message.into(),
        }
    }

    /// Map a transport-level `reqwest` error for `provider`.
    pub fn from_reqwest(provider: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { provider }
        } else if err.is_decode() {
            Self::Decode(format!("{provider}: {err}"))
        } else {
            Self::upstream(provider, err.status().map(|s| s.as_u16()), err.to_string())
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Timeouts, connection failures, 5xx and 429 responses are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Upstream { status: None, .. } => true,
            Self::Upstream {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 429,
            Self::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

impl From<crate::domain::FieldError> for RelayError {
    fn from(err: crate::domain::FieldError) -> Self {
        Self::validation(err.field, err.message)
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|s| format!(" with status {s}"))
        .unwrap_or_default()
}

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RelayError::Timeout { provider: "pinata" }.is_transient());
        assert!(RelayError::upstream("pinata", Some(503), "unavailable").is_transient());
        assert!(RelayError::upstream("pinata", Some(429), "slow down").is_transient());
        assert!(RelayError::upstream("pinata", None, "connection reset").is_transient());
        assert!(!RelayError::upstream("pinata", Some(401), "bad key").is_transient());
        assert!(!RelayError::validation("severity", "out of range").is_transient());
        assert!(!RelayError::Configuration("missing key".into()).is_transient());
    }

    #[test]
    fn test_upstream_display() {
        let err = RelayError::upstream("pinata", Some(500), "boom");
        assert_eq!(err.to_string(), "pinata request failed with status 500: boom");
        let err = RelayError::upstream("gateway", None, "reset");
        assert_eq!(err.to_string(), "gateway request failed: reset");
    }
}
