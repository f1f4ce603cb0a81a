//! Structured API error responses with error codes
//!
//! Every failing endpoint returns the same envelope with a machine-readable
//! code, so clients never have to parse messages. Provider details are logged
//! server side and never reach the response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::domain::{PREMIUM_CURRENCY, PREMIUM_PRICE};
use crate::infra::RelayError;

// ============================================================================
// Error Codes
// ============================================================================

/// Error codes for API responses
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (3xxx)
    /// Request body is malformed
    InvalidRequestBody,
    /// Required field is missing
    MissingRequiredField,
    /// Field value is invalid
    InvalidFieldValue,
    /// Payload exceeds size limit
    PayloadTooLarge,

    // Resource errors (4xxx)
    /// Requested resource not found
    ResourceNotFound,

    // Access errors (7xxx)
    /// Wallet has no active premium grant
    PremiumRequired,

    // Infrastructure errors (8xxx)
    /// Payment ledger query failed
    DatabaseError,
    /// A provider call failed
    UpstreamFailure,
    /// A provider call timed out
    Timeout,
    /// Provider credentials are missing
    ServiceMisconfigured,
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn numeric_code(&self) -> u32 {
        match self {
            ErrorCode::InvalidRequestBody => 3001,
            ErrorCode::MissingRequiredField => 3002,
            ErrorCode::InvalidFieldValue => 3003,
            ErrorCode::PayloadTooLarge => 3004,

            ErrorCode::ResourceNotFound => 4001,

            ErrorCode::PremiumRequired => 7001,

            ErrorCode::DatabaseError => 8001,
            ErrorCode::UpstreamFailure => 8002,
            ErrorCode::Timeout => 8003,
            ErrorCode::ServiceMisconfigured => 8004,
            ErrorCode::InternalError => 8999,
        }
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequestBody
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue => StatusCode::BAD_REQUEST,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,

            ErrorCode::ResourceNotFound => StatusCode::NOT_FOUND,

            ErrorCode::PremiumRequired => StatusCode::FORBIDDEN,

            // Provider failures surface as plain 500s
            ErrorCode::DatabaseError
            | ErrorCode::UpstreamFailure
            | ErrorCode::Timeout
            | ErrorCode::ServiceMisconfigured
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code_str = match self {
            ErrorCode::InvalidRequestBody => "INVALID_REQUEST_BODY",
            ErrorCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ErrorCode::InvalidFieldValue => "INVALID_FIELD_VALUE",
            ErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorCode::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorCode::PremiumRequired => "PREMIUM_REQUIRED",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::UpstreamFailure => "UPSTREAM_FAILURE",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::ServiceMisconfigured => "SERVICE_MISCONFIGURED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", code_str)
    }
}

// ============================================================================
// Structured Error Response
// ============================================================================

/// Structured error response for API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Error details
    pub error: ErrorDetails,

    /// Set on paywall denials so clients can show the payment prompt
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub premium_required: bool,
}

/// Detailed error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code for easy categorization
    pub numeric_code: u32,

    /// Human-readable error message
    pub message: String,

    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Related resource ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetails {
                code,
                numeric_code: code.numeric_code(),
                message: message.into(),
                details: None,
                resource_id: None,
            },
            premium_required: false,
        }
    }

    /// Set additional details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }

    /// Set related resource ID
    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.error.resource_id = Some(id.into());
        self
    }

    /// Get the HTTP status code
    pub fn status(&self) -> StatusCode {
        self.error.code.http_status()
    }

    /// Map a library error, using `failure_message` for anything that is not
    /// the caller's fault.
    pub fn from_relay(err: RelayError, failure_message: &str) -> Self {
        match err {
            RelayError::Validation { field, message } => {
                validation_error(&field, message)
            }
            RelayError::NotFound(id) => not_found("Incident", id),
            RelayError::Configuration(msg) => {
                error!(error = %msg, "Service misconfigured");
                ApiError::new(ErrorCode::ServiceMisconfigured, "Server configuration error")
            }
            RelayError::Timeout { provider } => {
                error!(provider, "Provider timed out");
                ApiError::new(ErrorCode::Timeout, failure_message)
            }
            e @ (RelayError::Upstream { .. } | RelayError::Decode(_)) => {
                error!(error = %e, "Provider call failed");
                ApiError::new(ErrorCode::UpstreamFailure, failure_message)
            }
            RelayError::Database(e) => {
                error!(error = %e, "Payment ledger error");
                ApiError::new(ErrorCode::DatabaseError, failure_message)
            }
            RelayError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                ApiError::new(ErrorCode::InternalError, failure_message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code_str = self.error.code.to_string();
        let mut response = (status, Json(self)).into_response();

        // Add error code header for easier debugging
        if let Ok(code_value) = axum::http::HeaderValue::from_str(&code_str) {
            response.headers_mut().insert(
                axum::http::header::HeaderName::from_static("x-error-code"),
                code_value,
            );
        }

        response
    }
}

// ============================================================================
// Conversion from RelayError
// ============================================================================

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        ApiError::from_relay(err, "Internal server error")
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Create a not found error for a specific resource type
pub fn not_found(resource_type: &str, id: impl std::fmt::Display) -> ApiError {
    ApiError::new(
        ErrorCode::ResourceNotFound,
        format!("{} not found: {}", resource_type, id),
    )
    .with_resource_id(id.to_string())
}

/// Create a validation error with field details
pub fn validation_error(field: &str, message: impl Into<String>) -> ApiError {
    let message = message.into();
    warn!(field, message = %message, "Rejected request");
    ApiError::new(ErrorCode::InvalidFieldValue, message).with_details(serde_json::json!({
        "field": field
    }))
}

/// Create a missing field error
pub fn missing_field(field: &str) -> ApiError {
    ApiError::new(
        ErrorCode::MissingRequiredField,
        format!("{} is required", field),
    )
    .with_details(serde_json::json!({ "field": field }))
}

/// Create a malformed body error
pub fn invalid_body(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::InvalidRequestBody, message.into())
}

/// Paywall denial for premium endpoints
pub fn premium_required() -> ApiError {
    let mut err = ApiError::new(ErrorCode::PremiumRequired, "Premium access required")
        .with_details(serde_json::json!({
            "hint": format!("Pay ${} {} to unlock premium analytics", PREMIUM_PRICE, PREMIUM_CURRENCY),
            "price": PREMIUM_PRICE,
            "currency": PREMIUM_CURRENCY,
        }));
    err.premium_required = true;
    err
}

// ============================================================================
// Tests
// ============================================================================
