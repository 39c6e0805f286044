//! # Caller Identity Extraction
//!
//! The parent platform is the only client of this gateway and has already
//! performed its own permission checks (§ Non-goals) by the time a request
//! reaches us; it identifies the acting user by forwarding the
//! `X-Authorized-User` header with the user's opaque platform URI. This
//! module turns that header into a [`CallerContext`] the rest of the
//! gateway can pass around, the way the teacher's JWT middleware turned a
//! bearer token into an `AuthenticatedUser`.
//!
//! Requests with no header (health checks, the Waterbutler-compatibility
//! surface, which authenticates via HMAC instead) simply have no
//! `CallerContext` in their extensions; handlers that require one use the
//! [`CallerContext`] extractor and get `ApiError::Unauthorized` if it's
//! missing.

use crate::errors::ApiError;
use actix_web::{dev::ServiceRequest, Error, HttpMessage};
use std::future::Ready;

/// The forwarded-identity header name. The parent platform sets this after
/// resolving its own session/cookie; we never validate a session here.
pub const CALLER_HEADER: &str = "X-Authorized-User";

/// The acting user for one request, as asserted by the parent platform.
///
/// `user_uri` is a `UserReference`'s opaque URI (spec'd as unique); this
/// gateway does not interpret its shape further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub user_uri: String,
}

impl CallerContext {
    pub fn new(user_uri: impl Into<String>) -> Self {
        Self { user_uri: user_uri.into() }
    }

    /// Reads and inserts the caller into a request's extensions.
    ///
    /// Returns `Ok(None)` (not an error) when the header is absent, so
    /// unauthenticated-friendly endpoints can still run; handlers that
    /// require a caller use the `CallerContext` extractor instead.
    pub fn attach(req: &ServiceRequest) -> Result<Option<Self>, ApiError> {
        let Some(header) = req.headers().get(CALLER_HEADER) else {
            return Ok(None);
        };
        let user_uri = header
            .to_str()
            .map_err(|_| ApiError::BadRequest { message: format!("malformed {CALLER_HEADER} header") })?
            .to_string();
        if user_uri.is_empty() {
            return Err(ApiError::BadRequest { message: format!("empty {CALLER_HEADER} header") });
        }
        let caller = Self::new(user_uri);
        req.extensions_mut().insert(caller.clone());
        Ok(Some(caller))
    }
}

/// Extractor for handlers that require an authenticated caller.
///
/// Relies on [`CallerContext::attach`] having already run (typically from a
/// lightweight middleware in `gateway`); returns `ApiError::Unauthorized`
/// if nothing was attached.
impl actix_web::FromRequest for CallerContext {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        let result = req
            .extensions()
            .get::<CallerContext>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized.into());
        std::future::ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_attach_extracts_header() {
        let req = TestRequest::default()
            .insert_header((CALLER_HEADER, "https://platform.example/users/abc123"))
            .to_srv_request();
        let caller = CallerContext::attach(&req).unwrap();
        assert_eq!(caller.unwrap().user_uri, "https://platform.example/users/abc123");
    }

    #[test]
    fn test_attach_returns_none_when_missing() {
        let req = TestRequest::default().to_srv_request();
        assert!(CallerContext::attach(&req).unwrap().is_none());
    }

    #[test]
    fn test_attach_rejects_empty_header() {
        let req = TestRequest::default().insert_header((CALLER_HEADER, "")).to_srv_request();
        assert!(CallerContext::attach(&req).is_err());
    }
}
