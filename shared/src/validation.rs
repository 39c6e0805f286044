//! # Request Validation Helpers
//!
//! Utilities for validating incoming request data using the `validator` crate.
//!
//! ## How Validation Works
//!
//! ```rust,ignore
//! use validator::Validate;
//!
//! #[derive(Validate)]
//! struct CreateAuthorizedAccount {
//!     #[validate(custom(function = "validators::not_blank"))]
//!     display_name: String,
//!
//!     #[validate(custom(function = "validators::valid_external_uri"))]
//!     user_uri: String,
//! }
//! ```
//!
//! ## Error Response Format
//!
//! ```json
//! {
//!   "code": "VALIDATION_ERROR",
//!   "message": "Validation error",
//!   "details": {
//!     "operation_name": [
//!       { "code": "invalid_operation_name", "message": "..." }
//!     ]
//!   }
//! }
//! ```
//!
//! ## Related Documentation
//!
//! - [`validator` crate](https://docs.rs/validator/)
//! - [`crate::errors::ApiError`] - Error handling

use crate::errors::ApiError;
use serde::de::DeserializeOwned;
use validator::Validate;

// =============================================================================
// Core Validation Functions
// =============================================================================

/// Validates a request DTO that implements `Validate`.
///
/// # Errors
///
/// Returns `ApiError::ValidationError` with field-level details if
/// validation fails.
pub fn validate_request<T: Validate>(data: &T) -> Result<(), ApiError> {
    data.validate().map_err(ApiError::ValidationError)
}

/// Parses a JSON string and validates in a single step.
///
/// # Errors
///
/// - `ApiError::BadRequest` if JSON parsing fails
/// - `ApiError::ValidationError` if validation fails
pub fn parse_and_validate<T: DeserializeOwned + Validate>(json: &str) -> Result<T, ApiError> {
    let data: T =
        serde_json::from_str(json).map_err(|e| ApiError::BadRequest { message: e.to_string() })?;
    validate_request(&data)?;
    Ok(data)
}

/// Custom validation functions for use with `#[validate(custom)]`.
pub mod validators {
    use validator::ValidationError;

    /// String is not empty after trimming.
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new("blank"));
        }
        Ok(())
    }

    /// A `UserReference`/`ResourceReference` URI: must carry a scheme and be
    /// non-empty past it. The parent platform mints these; we only check
    /// shape, never resolve them.
    pub fn valid_external_uri(value: &str) -> Result<(), ValidationError> {
        match value.split_once("://") {
            Some((scheme, rest)) if !scheme.is_empty() && !rest.is_empty() => Ok(()),
            _ => Err(ValidationError::new("invalid_external_uri")),
        }
    }

    /// An operation's fully-qualified name, `"<IMP>:<operation>"` (§4.4).
    /// Both halves must be non-empty and there must be exactly one colon.
    pub fn valid_operation_name(value: &str) -> Result<(), ValidationError> {
        let mut parts = value.splitn(2, ':');
        match (parts.next(), parts.next()) {
            (Some(imp), Some(op)) if !imp.is_empty() && !op.is_empty() && !op.contains(':') => Ok(()),
            _ => Err(ValidationError::new("invalid_operation_name")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::validators::*;

    #[test]
    fn test_not_blank() {
        assert!(not_blank("hello").is_ok());
        assert!(not_blank("").is_err());
        assert!(not_blank("   ").is_err());
    }

    #[test]
    fn test_valid_external_uri() {
        assert!(valid_external_uri("https://platform.example/users/1").is_ok());
        assert!(valid_external_uri("not-a-uri").is_err());
        assert!(valid_external_uri("scheme://").is_err());
    }

    #[test]
    fn test_valid_operation_name() {
        assert!(valid_operation_name("box:list_root_items").is_ok());
        assert!(valid_operation_name("missing_colon").is_err());
        assert!(valid_operation_name("box:").is_err());
        assert!(valid_operation_name(":list_root_items").is_err());
        assert!(valid_operation_name("box:a:b").is_err());
    }
}
