//! Bridges a decrypted `ExternalCredentialsRecord` into the
//! `gravy_http::CredentialsProvider` seam C1 depends on. This is the
//! per-invocation half of C5 (§4.5: "a C1 Requestor bound to the
//! account's credentials"): built fresh from a decrypted snapshot,
//! refreshed in place through the single-flight coalescer on demand, and
//! written back through the repository so the next invocation sees the
//! new token.

use async_trait::async_trait;
use gravy_crypto::{Cipher, Credentials};
use gravy_domain::entities::ExternalCredentialsRecord;
use gravy_domain::repository::ExternalCredentialsRepository;
use gravy_http::{CredentialsProvider, HttpError};
use gravy_oauth::{oauth1, oauth2, ProviderQuirks, SingleFlightRefresher};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// The subset of an `OAuth2ClientConfig` the refresh grant needs.
#[derive(Debug, Clone)]
pub struct OAuth2ClientParams {
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub quirks: ProviderQuirks,
}

/// The subset of an `OAuth1ClientConfig` per-request signing needs
/// (§4.3.6). Unlike OAuth2, OAuth1 has no refresh grant — these two
/// values are all `sign_request` ever asks for.
#[derive(Debug, Clone)]
pub struct OAuth1ClientParams {
    pub consumer_key: String,
    pub consumer_secret: String,
}

/// A per-invocation, refreshing credentials source for one
/// `AuthorizedAccount`. Never shared across accounts; the single-flight
/// coalescing across *concurrent invocations of the same account* is
/// handled by the shared `SingleFlightRefresher` it's constructed with.
pub struct AccountCredentialsProvider {
    account_id: Uuid,
    credentials_id: Uuid,
    current: Mutex<Credentials>,
    cipher: Arc<Cipher>,
    repository: Arc<ExternalCredentialsRepository>,
    refresher: Arc<SingleFlightRefresher>,
    http_client: reqwest::Client,
    oauth2_client: Option<OAuth2ClientParams>,
    oauth1_client: Option<OAuth1ClientParams>,
}

impl AccountCredentialsProvider {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: Uuid,
        credentials_id: Uuid,
        initial: Credentials,
        cipher: Arc<Cipher>,
        repository: Arc<ExternalCredentialsRepository>,
        refresher: Arc<SingleFlightRefresher>,
        http_client: reqwest::Client,
        oauth2_client: Option<OAuth2ClientParams>,
        oauth1_client: Option<OAuth1ClientParams>,
    ) -> Self {
        Self {
            account_id,
            credentials_id,
            current: Mutex::new(initial),
            cipher,
            repository,
            refresher,
            http_client,
            oauth2_client,
            oauth1_client,
        }
    }

    async fn persist(&self, creds: &Credentials) -> Result<(), HttpError> {
        let record = self
            .repository
            .find_by_id(self.credentials_id)
            .await
            .map_err(|e| HttpError::CredentialRefresh(e.to_string()))?
            .ok_or_else(|| HttpError::CredentialRefresh("credentials record vanished mid-refresh".to_string()))?;
        let encrypted = self
            .cipher
            .encrypt_json(creds, &record.key_params)
            .map_err(|e| HttpError::CredentialRefresh(e.to_string()))?;
        self.repository
            .update_blob(self.credentials_id, encrypted, &record.key_params)
            .await
            .map_err(|e| HttpError::CredentialRefresh(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CredentialsProvider for AccountCredentialsProvider {
    async fn current(&self) -> Result<Credentials, HttpError> {
        Ok(self.current.lock().await.clone())
    }

    async fn refresh_oauth2(&self) -> Result<Credentials, HttpError> {
        let oauth2_client = self
            .oauth2_client
            .as_ref()
            .ok_or_else(|| HttpError::CredentialRefresh("account has no OAuth2 client config".to_string()))?;

        let stale = self.current.lock().await.clone();
        let (refresh_token, fallback_scopes) = match &stale {
            Credentials::OAuth2 { refresh_token: Some(rt), authorized_scopes, .. } => {
                (rt.clone(), authorized_scopes.clone())
            }
            _ => return Err(HttpError::CredentialRefresh("no refresh_token to refresh with".to_string())),
        };

        // access_token_only providers (§4.3.5) have no refresh endpoint at
        // all; the current access token just keeps being used as-is.
        if !oauth2_client.quirks.should_refresh() {
            return Ok(stale);
        }

        let client = self.http_client.clone();
        let token_uri = oauth2_client.token_uri.clone();
        let client_id = oauth2_client.client_id.clone();
        let client_secret = oauth2_client.client_secret.clone();
        let quirks = oauth2_client.quirks;

        let refreshed = self
            .refresher
            .refresh(self.account_id, move || {
                let client = client.clone();
                let token_uri = token_uri.clone();
                let client_id = client_id.clone();
                let client_secret = client_secret.clone();
                let refresh_token = refresh_token.clone();
                let fallback_scopes = fallback_scopes.clone();
                async move {
                    oauth2::refresh_access_token(&client, &token_uri, &client_id, &client_secret, &refresh_token, fallback_scopes, &quirks)
                        .await
                        .map_err(|e| e.to_string())
                }
            })
            .await
            .map_err(HttpError::CredentialRefresh)?;

        self.persist(&refreshed).await?;
        *self.current.lock().await = refreshed.clone();
        Ok(refreshed)
    }

    async fn oauth1_signature(&self, method: &str, url: &str) -> Result<Option<String>, HttpError> {
        let current = self.current.lock().await.clone();
        let (token, token_secret) = match current {
            Credentials::OAuth1 { token, token_secret } => (token, token_secret),
            _ => return Ok(None),
        };
        let oauth1_client = self
            .oauth1_client
            .as_ref()
            .ok_or_else(|| HttpError::CredentialRefresh("account has no OAuth1 client config".to_string()))?;

        Ok(Some(oauth1::sign_request(
            method,
            url,
            &oauth1_client.consumer_key,
            &oauth1_client.consumer_secret,
            &token,
            &token_secret,
        )))
    }
}

pub fn decrypt_credentials(cipher: &Cipher, record: &ExternalCredentialsRecord) -> Result<Credentials, HttpError> {
    cipher
        .decrypt_json(&record.encrypted_blob, &record.key_params)
        .map_err(|e| HttpError::CredentialRefresh(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::config::EncryptionConfig;

    fn test_cipher() -> Arc<Cipher> {
        Arc::new(Cipher::new(&EncryptionConfig {
            secret: "test-secret-at-least-32-bytes-long".to_string(),
            priors: vec![],
            scrypt_cost: 1 << 14,
            scrypt_block_size: 8,
            scrypt_parallelization: 1,
            salt_len: 17,
            derived_key_cache_size: 4,
        }))
    }

    fn provider(initial: Credentials, oauth1_client: Option<OAuth1ClientParams>) -> AccountCredentialsProvider {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/unused").expect("lazy pool never connects");
        AccountCredentialsProvider::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            initial,
            test_cipher(),
            Arc::new(ExternalCredentialsRepository::new(pool)),
            Arc::new(SingleFlightRefresher::new()),
            reqwest::Client::new(),
            None,
            oauth1_client,
        )
    }

    #[tokio::test]
    async fn test_oauth1_signature_is_none_for_non_oauth1_credentials() {
        let provider = provider(Credentials::AccessToken { token: "AT1".to_string() }, None);
        let signature = provider.oauth1_signature("GET", "https://api.example.com/items").await.unwrap();
        assert!(signature.is_none());
    }

    #[tokio::test]
    async fn test_oauth1_signature_errors_without_client_config() {
        let provider =
            provider(Credentials::OAuth1 { token: "t".to_string(), token_secret: "s".to_string() }, None);
        let err = provider.oauth1_signature("GET", "https://api.example.com/items").await.unwrap_err();
        assert!(matches!(err, HttpError::CredentialRefresh(_)));
    }

    #[tokio::test]
    async fn test_oauth1_signature_signs_with_client_config() {
        let oauth1_client = OAuth1ClientParams { consumer_key: "ck".to_string(), consumer_secret: "cs".to_string() };
        let provider = provider(
            Credentials::OAuth1 { token: "t".to_string(), token_secret: "s".to_string() },
            Some(oauth1_client),
        );
        let signature = provider.oauth1_signature("GET", "https://api.example.com/items").await.unwrap().unwrap();
        assert!(signature.starts_with("OAuth "));
        assert!(signature.contains("oauth_consumer_key=\"ck\""));
    }
}
