//! The tagged `Credentials` sum type (§4.2), plus the invariant checks
//! enforced whenever one is constructed or updated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidCredentials {
    #[error("OAuth2 credentials with an access_token must also carry a refresh_token")]
    AccessTokenWithoutRefresh,

    #[error("OAuth2 credentials cannot carry both an access_token and a state_token")]
    AccessTokenWithStateToken,
}

/// One provider credential, tagged by format. Stored encrypted
/// (`gravy-crypto::Cipher`) and handed to provider implementations only
/// through `gravy-http`'s `Requestor`, never directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format")]
pub enum Credentials {
    AccessToken {
        token: String,
    },
    OAuth1 {
        token: String,
        token_secret: String,
    },
    OAuth2 {
        access_token: Option<String>,
        refresh_token: Option<String>,
        access_token_expires_at: Option<DateTime<Utc>>,
        state_token: Option<String>,
        #[serde(default)]
        authorized_scopes: Vec<String>,
    },
    UsernamePassword {
        user: String,
        password: String,
    },
    AccessKeySecretKey {
        key: String,
        secret: String,
    },
}

impl Credentials {
    /// Enforces the ExternalCredentials invariants (§3, §4.2) that apply
    /// regardless of where the value came from: a request body, a token
    /// exchange response, or a row just decrypted from storage.
    pub fn validate(&self) -> Result<(), InvalidCredentials> {
        if let Self::OAuth2 { access_token, refresh_token, state_token, .. } = self {
            if access_token.is_some() && state_token.is_some() {
                return Err(InvalidCredentials::AccessTokenWithStateToken);
            }
            if access_token.is_some() && refresh_token.is_none() {
                return Err(InvalidCredentials::AccessTokenWithoutRefresh);
            }
        }
        Ok(())
    }

    /// The `Authorization`-style header tuples C1 injects at send-time.
    ///
    /// `OAuth1` yields nothing here: OAuth1a signing depends on the
    /// request's method, URL, and a fresh nonce/timestamp, so it's
    /// computed per-request by `gravy-oauth`'s signer, via
    /// `CredentialsProvider::oauth1_signature`, rather than as a static
    /// header. `UsernamePassword`/`AccessKeySecretKey` likewise
    /// yield nothing — providers that use them fold the values into the
    /// request differently per provider (query param, body, or `Basic`
    /// only for the ones that want it).
    pub fn iter_auth_headers(&self) -> Vec<(String, String)> {
        match self {
            Self::AccessToken { token } => vec![("Authorization".to_string(), format!("Bearer {token}"))],
            Self::OAuth2 { access_token: Some(token), .. } => {
                vec![("Authorization".to_string(), format!("Bearer {token}"))]
            }
            _ => vec![],
        }
    }

    /// Whether an OAuth2 credential's access token needs a refresh before
    /// use, given a freshness window (§4.3.3).
    pub fn needs_oauth2_refresh(&self, freshness_window: chrono::Duration, now: DateTime<Utc>) -> bool {
        match self {
            Self::OAuth2 { access_token, access_token_expires_at, .. } => match (access_token, access_token_expires_at) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(_), Some(expires_at)) => *expires_at - now <= freshness_window,
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_yields_bearer_header() {
        let creds = Credentials::AccessToken { token: "tok123".to_string() };
        assert_eq!(creds.iter_auth_headers(), vec![("Authorization".to_string(), "Bearer tok123".to_string())]);
    }

    #[test]
    fn test_oauth2_with_access_token_yields_bearer_header() {
        let creds = Credentials::OAuth2 {
            access_token: Some("AT1".to_string()),
            refresh_token: Some("RT1".to_string()),
            access_token_expires_at: None,
            state_token: None,
            authorized_scopes: vec![],
        };
        assert_eq!(creds.iter_auth_headers(), vec![("Authorization".to_string(), "Bearer AT1".to_string())]);
    }

    #[test]
    fn test_oauth1_yields_no_static_headers() {
        let creds = Credentials::OAuth1 { token: "t".to_string(), token_secret: "s".to_string() };
        assert!(creds.iter_auth_headers().is_empty());
    }

    #[test]
    fn test_access_token_without_refresh_is_invalid() {
        let creds = Credentials::OAuth2 {
            access_token: Some("AT1".to_string()),
            refresh_token: None,
            access_token_expires_at: None,
            state_token: None,
            authorized_scopes: vec![],
        };
        assert_eq!(creds.validate(), Err(InvalidCredentials::AccessTokenWithoutRefresh));
    }

    #[test]
    fn test_access_token_with_state_token_is_invalid() {
        let creds = Credentials::OAuth2 {
            access_token: Some("AT1".to_string()),
            refresh_token: Some("RT1".to_string()),
            access_token_expires_at: None,
            state_token: Some("S1".to_string()),
            authorized_scopes: vec![],
        };
        assert_eq!(creds.validate(), Err(InvalidCredentials::AccessTokenWithStateToken));
    }

    #[test]
    fn test_pending_state_token_alone_is_valid() {
        let creds = Credentials::OAuth2 {
            access_token: None,
            refresh_token: None,
            access_token_expires_at: None,
            state_token: Some("S1".to_string()),
            authorized_scopes: vec![],
        };
        assert!(creds.validate().is_ok());
    }

    #[test]
    fn test_needs_refresh_when_absent() {
        let creds = Credentials::OAuth2 {
            access_token: None,
            refresh_token: Some("RT1".to_string()),
            access_token_expires_at: None,
            state_token: None,
            authorized_scopes: vec![],
        };
        assert!(creds.needs_oauth2_refresh(chrono::Duration::seconds(60), Utc::now()));
    }

    #[test]
    fn test_needs_refresh_within_window() {
        let now = Utc::now();
        let creds = Credentials::OAuth2 {
            access_token: Some("AT1".to_string()),
            refresh_token: Some("RT1".to_string()),
            access_token_expires_at: Some(now + chrono::Duration::seconds(30)),
            state_token: None,
            authorized_scopes: vec![],
        };
        assert!(creds.needs_oauth2_refresh(chrono::Duration::seconds(60), now));
        assert!(!creds.needs_oauth2_refresh(chrono::Duration::seconds(10), now));
    }
}
