//! Token-endpoint exchange: trading an authorization code (or a refresh
//! token) for a fresh access token (§4.3.2, §4.3.3).
//!
//! No `addon_service/oauth/` file in the retrieved corpus performs this
//! exchange directly — it's handled by a third-party OAuth2 client library
//! in the original. This follows the standard RFC 6749 §4.1.3 / §6 grant
//! requests (form-urlencoded POST to the provider's `token_uri`).

use chrono::Utc;
use gravy_crypto::Credentials;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::quirks::ProviderQuirks;

#[derive(Debug, Error)]
pub enum OAuth2Error {
    #[error("token endpoint request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    ProviderRejected { status: u16, body: String },

    /// `quirks.access_token_only` marks this client as having no refresh
    /// grant to call at all (§4.3.5); the caller should keep using its
    /// current access token rather than treat this as a failure.
    #[error("provider quirks mark this client access-token-only; there is no refresh endpoint to call")]
    RefreshNotSupported,
}

/// The subset of an RFC 6749 token response this gateway cares about.
/// Providers vary in which optional fields they send back; `scope` and
/// `refresh_token` are both commonly omitted on a refresh response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

impl TokenResponse {
    fn into_credentials(self, fallback_refresh_token: Option<String>, fallback_scopes: Vec<String>) -> Credentials {
        let authorized_scopes = match self.scope {
            Some(scope) => scope.split(',').map(str::to_string).collect(),
            None => fallback_scopes,
        };
        Credentials::OAuth2 {
            access_token: Some(self.access_token),
            refresh_token: self.refresh_token.or(fallback_refresh_token),
            access_token_expires_at: self.expires_in.map(|seconds| Utc::now() + chrono::Duration::seconds(seconds)),
            state_token: None,
            authorized_scopes,
        }
    }
}

async fn post_form(client: &Client, token_uri: &str, params: &[(&str, &str)]) -> Result<TokenResponse, OAuth2Error> {
    let response = client.post(token_uri).form(params).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(OAuth2Error::ProviderRejected { status: status.as_u16(), body });
    }
    serde_json::from_str(&body)
        .map_err(|e| OAuth2Error::ProviderRejected { status: status.as_u16(), body: format!("unparseable token response: {e}") })
}

/// Exchanges an authorization code delivered to the OAuth2 callback for an
/// access/refresh token pair (the second leg of the auth-code grant).
pub async fn exchange_authorization_code(
    client: &Client,
    token_uri: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<Credentials, OAuth2Error> {
    let response = post_form(
        client,
        token_uri,
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", redirect_uri),
        ],
    )
    .await?;
    Ok(response.into_credentials(None, vec![]))
}

/// Exchanges a refresh token for a new access token (§4.3.3). Per
/// `ProviderQuirks::non_expiring_refresh_token`, callers that know the
/// provider never rotates its refresh token should keep using the
/// original one even when the response carries none back, which is why
/// the caller's current credential is passed in as a fallback.
///
/// `quirks.access_token_only` short-circuits with
/// [`OAuth2Error::RefreshNotSupported`] before any request goes out — some
/// providers issue only a long-lived access token and have no refresh
/// grant at all. `quirks.space_separated_scopes` governs how `fallback_scopes`
/// is joined when RFC 6749 §6's optional `scope` narrowing parameter is sent.
pub async fn refresh_access_token(
    client: &Client,
    token_uri: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
    fallback_scopes: Vec<String>,
    quirks: &ProviderQuirks,
) -> Result<Credentials, OAuth2Error> {
    if !quirks.should_refresh() {
        return Err(OAuth2Error::RefreshNotSupported);
    }

    let mut params = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", client_id),
        ("client_secret", client_secret),
    ];
    let joined_scopes = (!fallback_scopes.is_empty()).then(|| quirks.join_scopes(&fallback_scopes));
    if let Some(scope) = joined_scopes.as_deref() {
        params.push(("scope", scope));
    }

    let response = post_form(client, token_uri, &params).await?;
    Ok(response.into_credentials(Some(refresh_token.to_string()), fallback_scopes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_exchange_authorization_code_builds_oauth2_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "AT1",
                "refresh_token": "RT1",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;

        let client = Client::new();
        let creds = exchange_authorization_code(
            &client,
            &format!("{}/token", server.uri()),
            "client-id",
            "client-secret",
            "auth-code",
            "https://gateway.example/callback",
        )
        .await
        .unwrap();

        match creds {
            Credentials::OAuth2 { access_token, refresh_token, access_token_expires_at, .. } => {
                assert_eq!(access_token, Some("AT1".to_string()));
                assert_eq!(refresh_token, Some("RT1".to_string()));
                assert!(access_token_expires_at.is_some());
            }
            _ => panic!("expected OAuth2 credentials"),
        }
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token_when_response_omits_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "AT2",
            })))
            .mount(&server)
            .await;

        let client = Client::new();
        let creds = refresh_access_token(
            &client,
            &format!("{}/token", server.uri()),
            "client-id",
            "client-secret",
            "RT1",
            vec![],
            &ProviderQuirks::none(),
        )
        .await
        .unwrap();

        match creds {
            Credentials::OAuth2 { refresh_token, .. } => assert_eq!(refresh_token, Some("RT1".to_string())),
            _ => panic!("expected OAuth2 credentials"),
        }
    }

    #[tokio::test]
    async fn test_refresh_is_skipped_when_access_token_only_quirk_is_set() {
        // No mock mounted: a network call here would panic the test, which
        // is exactly how we know `should_refresh()` gated it beforehand.
        let server = MockServer::start().await;
        let client = Client::new();
        let quirks = ProviderQuirks { access_token_only: true, ..ProviderQuirks::none() };

        let err = refresh_access_token(
            &client,
            &format!("{}/token", server.uri()),
            "client-id",
            "client-secret",
            "RT1",
            vec![],
            &quirks,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, OAuth2Error::RefreshNotSupported));
    }

    #[tokio::test]
    async fn test_provider_rejection_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let client = Client::new();
        let err = exchange_authorization_code(
            &client,
            &format!("{}/token", server.uri()),
            "client-id",
            "client-secret",
            "stale-code",
            "https://gateway.example/callback",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, OAuth2Error::ProviderRejected { status: 400, .. }));
    }
}
