//! # Application Error Types
//!
//! Unified error handling for the addon gateway, with automatic HTTP
//! conversion for both Actix-web handlers and axum-style services.
//!
//! ## Design Philosophy
//!
//! Each variant maps to one of the kinds in spec §7 and to a specific
//! HTTP status code. The mapping is the single source of truth consumed
//! by both framework integrations below.
//!
//! ## Error Response Format
//!
//! ```json
//! {
//!   "code": "PROVIDER_ERROR",
//!   "message": "Provider returned an error",
//!   "request_id": "550e8400-e29b-41d4-a716-446655440000",
//!   "details": { "provider_status": 503 },
//!   "timestamp": "2024-01-15T10:30:00Z"
//! }
//! ```

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

pub type ApiResult<T> = Result<T, ApiError>;

/// Gateway-wide error taxonomy (spec §7).
///
/// Variants are grouped by the HTTP status they map to; `status_code()`
/// is the single source of truth for that mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    // ---- 400 ------------------------------------------------------------
    /// Invocation arguments failed schema binding against the operation's
    /// declared parameters (§4.6 "Argument binding").
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// Request body failed `validator`-derived field validation.
    #[error("validation error")]
    ValidationError(#[from] ValidationErrors),

    #[error("invalid input: {message}")]
    BadRequest { message: String },

    // ---- 401 --------------------------------------------------------------
    /// Caller did not present credentials the parent platform would accept.
    #[error("unauthorized")]
    Unauthorized,

    /// Credentials are missing, malformed, or a required refresh failed.
    /// Distinct internal kind from `Unauthorized`, but the same status.
    #[error("credential error: {message}")]
    CredentialError { message: String },

    // ---- 403 ----------------------------------------------------------------
    /// Caller lacks access to the target resource/account/operation.
    #[error("forbidden")]
    Forbidden,

    // ---- 404 ------------------------------------------------------------
    #[error("not found: {resource}")]
    NotFound { resource: String },

    // ---- 409 --------------------------------------------------------------
    #[error("conflict: {resource}")]
    Conflict { resource: String },

    // ---- 422 ----------------------------------------------------------------
    /// An implementation tried to resolve a URL outside its prefix.
    /// Always a programmer error in a provider implementation; logged and
    /// surfaced as a 500 to the caller, but kept as its own kind so the
    /// invocation's error record records what actually happened.
    #[error("relative URL escapes requestor prefix: {relative}")]
    InvalidRelativeURL { relative: String },

    // ---- 408 / 499 ------------------------------------------------------
    #[error("invocation timed out")]
    Timeout,

    #[error("invocation cancelled")]
    Cancelled,

    // ---- 409 (lease) ------------------------------------------------------
    /// Another worker already holds the execution lease on this invocation
    /// or credentials record (§4.6 state machine, §5).
    #[error("dibs denied")]
    DibsDenied,

    // ---- 502 ------------------------------------------------------------
    /// The external provider returned a non-2xx response.
    #[error("provider error ({provider_status}): {message}")]
    ProviderError { provider_status: u16, message: String },

    // ---- 500 --------------------------------------------------------------
    #[error("database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("redis error")]
    RedisError(#[from] redis::RedisError),

    #[error("internal server error")]
    InternalError { message: String },

    /// Unclassified failure inside a provider implementation. Preserved as
    /// the invocation's error record, but never leaks a stack trace.
    #[error("unexpected addon error: {message}")]
    UnexpectedAddonError { message: String },

    #[error("service unavailable: {service}")]
    ServiceUnavailable { service: String },
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArguments { .. } => "INVALID_ARGUMENTS",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::CredentialError { .. } => "CREDENTIAL_ERROR",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::InvalidRelativeURL { .. } => "INVALID_RELATIVE_URL",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::DibsDenied => "DIBS_DENIED",
            Self::ProviderError { .. } => "PROVIDER_ERROR",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::RedisError(_) => "REDIS_ERROR",
            Self::InternalError { .. } => "INTERNAL_ERROR",
            Self::UnexpectedAddonError { .. } => "UNEXPECTED_ADDON_ERROR",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArguments { .. }
            | Self::ValidationError(_)
            | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,

            Self::Unauthorized | Self::CredentialError { .. } => StatusCode::UNAUTHORIZED,

            Self::Forbidden => StatusCode::FORBIDDEN,

            Self::NotFound { .. } => StatusCode::NOT_FOUND,

            Self::Conflict { .. } | Self::DibsDenied => StatusCode::CONFLICT,

            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Cancelled => StatusCode::from_u16(499).unwrap(),

            Self::ProviderError { .. } => StatusCode::BAD_GATEWAY,

            Self::InvalidRelativeURL { .. }
            | Self::DatabaseError(_)
            | Self::RedisError(_)
            | Self::InternalError { .. }
            | Self::UnexpectedAddonError { .. } => StatusCode::INTERNAL_SERVER_ERROR,

            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// `true` for 5xx kinds: logged at ERROR and not detailed to the client.
    pub fn is_server_error(&self) -> bool {
        self.status_code().as_u16() >= 500
    }

    /// The `error.kind` string recorded on an `OperationInvocation` (§7).
    pub fn invocation_kind(&self) -> &'static str {
        match self {
            Self::InvalidArguments { .. } | Self::ValidationError(_) | Self::BadRequest { .. } => {
                "InvalidArguments"
            }
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::CredentialError { .. } => "CredentialError",
            Self::ProviderError { .. } => "ProviderError",
            Self::InvalidRelativeURL { .. } => "InvalidRelativeURL",
            Self::Timeout => "Timeout",
            Self::Cancelled => "Cancelled",
            Self::DibsDenied => "DibsDenied",
            _ => "UnexpectedAddonError",
        }
    }
}

/// Standard error response body, matching spec §7 ("no stack traces over
/// the wire").
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorResponse {
    pub fn new(error: &ApiError) -> Self {
        let details = match error {
            ApiError::ValidationError(errors) => {
                Some(serde_json::to_value(errors).unwrap_or_default())
            }
            ApiError::ProviderError { provider_status, .. } => {
                Some(serde_json::json!({ "provider_status": provider_status }))
            }
            // Server-side internals: never echoed to the client.
            ApiError::DatabaseError(_)
            | ApiError::RedisError(_)
            | ApiError::InternalError { .. }
            | ApiError::UnexpectedAddonError { .. } => None,
            _ => None,
        };

        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            request_id: None,
            details,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_map_to_401() {
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::CredentialError { message: "x".into() }.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_dibs_denied_maps_to_409() {
        assert_eq!(ApiError::DibsDenied.status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::DibsDenied.invocation_kind(), "DibsDenied");
    }

    #[test]
    fn test_provider_error_maps_to_502_and_carries_status() {
        let err = ApiError::ProviderError { provider_status: 503, message: "down".into() };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        let body = ErrorResponse::new(&err);
        assert_eq!(body.details.unwrap()["provider_status"], 503);
    }

    #[test]
    fn test_invalid_relative_url_is_server_error() {
        let err = ApiError::InvalidRelativeURL { relative: "/../admin".into() };
        assert!(err.is_server_error());
        assert_eq!(err.invocation_kind(), "InvalidRelativeURL");
    }

    #[test]
    fn test_error_response_includes_timestamp_and_request_id() {
        let id = Uuid::new_v4();
        let body = ErrorResponse::new(&ApiError::Forbidden).with_request_id(id);
        assert_eq!(body.request_id, Some(id.to_string()));
        assert!((chrono::Utc::now() - body.timestamp).num_seconds() < 60);
    }
}
