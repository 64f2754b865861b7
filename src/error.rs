//! Error types and HTTP response conversion
//!
//! Every handler funnels failures into [`Error`]; classification into an
//! operational kind, status code, and user-facing message happens here, in
//! one place. How much detail leaves the process is decided by the
//! rendering layer (see `middleware::errors`), which is constructed with an
//! explicit [`ReportMode`] instead of reading the environment.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using the service error
pub type Result<T> = std::result::Result<T, Error>;

/// How much failure detail is echoed back to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// Full message and diagnostic detail on every failure. Development only.
    Verbose,
    /// Sanitized messages for operational failures, a fixed generic message
    /// for everything else.
    #[default]
    Restricted,
}

/// Main error type for the service
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Input failed field-level validation; the message lists every violation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A unique field already holds the submitted value
    #[error("Duplicate value for unique field `{field}`: {value}")]
    Duplicate { field: String, value: String },

    /// A path or body reference that cannot be a document id
    #[error("Malformed reference: {0}")]
    MalformedReference(String),

    /// Credential token failed verification
    #[error("Invalid credential token")]
    InvalidToken,

    /// Credential token is past its expiry
    #[error("Expired credential token")]
    ExpiredToken,

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Authorization error
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Outbound mail delivery failed
    #[error("Mail error: {0}")]
    Mail(String),

    /// Payment collaborator failed
    #[error("Payment error: {0}")]
    Payment(String),

    /// Template rendering error
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Self::ExpiredToken,
            _ => Self::InvalidToken,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {err}"))
    }
}

impl Error {
    /// Whether this failure is expected and user-facing, as opposed to a
    /// programming or infrastructure fault.
    pub fn is_operational(&self) -> bool {
        !matches!(
            self,
            Self::Config(_) | Self::Template(_) | Self::Io(_) | Self::Internal(_)
        )
    }

    /// HTTP status code for this failure
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::Duplicate { .. }
            | Self::MalformedReference(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidToken | Self::ExpiredToken | Self::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::Mail(_) | Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Template(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable code for this failure kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Duplicate { .. } => "DUPLICATE_FIELD",
            Self::MalformedReference(_) => "MALFORMED_REFERENCE",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::ExpiredToken => "EXPIRED_TOKEN",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::Mail(_) => "MAIL_ERROR",
            Self::Payment(_) => "PAYMENT_ERROR",
            Self::Template(_) => "TEMPLATE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show in restricted mode.
    ///
    /// Operational failures keep their own text; everything else collapses
    /// to a fixed generic message.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Duplicate { field, value } => {
                format!("Duplicate value for {field}: \"{value}\". Please use another value")
            }
            Self::MalformedReference(value) => format!("Invalid id: {value}"),
            Self::InvalidToken => "Invalid token. Please log in again".to_string(),
            Self::ExpiredToken => "Your session has expired. Please log in again".to_string(),
            Self::Unauthorized(msg) | Self::Forbidden(msg) | Self::NotFound(msg)
            | Self::BadRequest(msg) => msg.clone(),
            Self::RateLimitExceeded => {
                "Too many requests from this address, please try again later".to_string()
            }
            Self::Mail(_) => {
                "There was an error sending the email. Try again later".to_string()
            }
            Self::Payment(_) => "Payment service is unavailable. Try again later".to_string(),
            Self::Config(_) | Self::Template(_) | Self::Io(_) | Self::Internal(_) => {
                "Something went wrong".to_string()
            }
        }
    }
}

/// Error response body for API paths
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Envelope status, always `"error"`
    pub status: String,

    /// User-facing message
    pub message: String,

    /// Machine-readable error code
    pub code: String,

    /// Internal diagnostic detail, present in verbose mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            code: code.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Full failure context attached to error responses so the rendering layer
/// can rebuild the body for page paths and verbose mode.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub status: StatusCode,
    pub code: &'static str,
    pub public_message: String,
    pub detail: String,
    pub operational: bool,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let context = ErrorContext {
            status,
            code: self.code(),
            public_message: self.public_message(),
            detail: self.to_string(),
            operational: self.is_operational(),
        };

        if context.operational {
            tracing::warn!(code = context.code, status = %status, "{}", context.detail);
        } else {
            tracing::error!(code = context.code, status = %status, "{}", context.detail);
        }

        // Restricted JSON is the default shape; the rendering layer swaps it
        // out for verbose detail or an HTML error page where appropriate.
        let body = ErrorBody::new(&context.public_message, context.code);
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(context);
        response
    }
}
