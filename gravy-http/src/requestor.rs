//! The `Requestor` type: the single surface provider implementations use
//! to reach the network (§4.1).
//!
//! A `Requestor` owns a prefix URL and a [`CredentialsProvider`] — never a
//! bare credentials value — so that an implicit OAuth2 refresh can happen
//! transparently at send-time. The provider side of that (single-flight
//! coalescing, the actual token-endpoint call) lives in `gravy-oauth`;
//! this crate only defines the seam so it doesn't have to depend on it.

use async_trait::async_trait;
use gravy_crypto::Credentials;
use reqwest::{Client, Method, Url};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::query::encode_query;
use crate::response::ResponseHandle;
use crate::url::{resolve, InvalidRelativeUrl};

#[derive(Debug, Error)]
pub enum HttpError {
    #[error(transparent)]
    InvalidRelativeUrl(#[from] InvalidRelativeUrl),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("credential refresh failed: {0}")]
    CredentialRefresh(String),
}

/// Supplies the credentials a `Requestor` authenticates with, and performs
/// an OAuth2 refresh on demand. Implemented by `gravy-oauth` (or a mock,
/// in tests) rather than by this crate, so C1 never has to know how a
/// refresh is coalesced.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    async fn current(&self) -> Result<Credentials, HttpError>;

    /// Called only when `current()` returned an `OAuth2` credential that
    /// `Credentials::needs_oauth2_refresh` says is stale.
    async fn refresh_oauth2(&self) -> Result<Credentials, HttpError>;

    /// The `Authorization: OAuth ...` header value for an OAuth1a-signed
    /// request, given its method and fully-resolved URL (query string
    /// included). `Ok(None)` for every credential format but `OAuth1` —
    /// the default covers all of those without every implementor having
    /// to repeat it. Implemented by `gravy-oauth`'s signer rather than
    /// this crate, for the same reason `refresh_oauth2` is: C1 doesn't
    /// depend on it.
    async fn oauth1_signature(&self, _method: &str, _url: &str) -> Result<Option<String>, HttpError> {
        Ok(None)
    }
}

/// The freshness window C1 uses to decide whether an OAuth2 token needs an
/// implicit refresh before a request goes out.
const REFRESH_FRESHNESS_WINDOW_SECONDS: i64 = 60;

/// A single outbound-request surface, pinned to one prefix URL and one
/// credentials reference. Implementations receive this by dependency
/// injection and have no other way to reach the network (§4.1).
pub struct Requestor {
    prefix_url: Url,
    credentials: Arc<dyn CredentialsProvider>,
    transport: Client,
}

impl Requestor {
    pub fn new(prefix_url: Url, credentials: Arc<dyn CredentialsProvider>, timeout: Duration) -> Self {
        let transport = Client::builder().timeout(timeout).build().expect("reqwest client config is valid");
        Self { prefix_url, credentials, transport }
    }

    /// Resolves `relative_path`, injects auth headers (refreshing OAuth2
    /// first if needed), and sends the request.
    pub async fn send(
        &self,
        method: Method,
        relative_path: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
        body: Option<Vec<u8>>,
    ) -> Result<ResponseHandle, HttpError> {
        let mut url = resolve(&self.prefix_url, relative_path)?;
        if !query.is_empty() {
            let encoded = encode_query(query);
            url.set_query(Some(&encoded));
        }

        let mut request = self.transport.request(method.clone(), url.clone());

        for (name, value) in self.auth_headers(method.as_str(), url.as_str()).await? {
            request = request.header(name, value);
        }
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(ResponseHandle::new(status, headers, body))
    }

    async fn auth_headers(&self, method: &str, url: &str) -> Result<Vec<(String, String)>, HttpError> {
        let mut creds = self.credentials.current().await?;
        if creds.needs_oauth2_refresh(chrono::Duration::seconds(REFRESH_FRESHNESS_WINDOW_SECONDS), chrono::Utc::now())
        {
            creds = self.credentials.refresh_oauth2().await?;
        }
        let mut headers = creds.iter_auth_headers();
        if let Some(oauth1_header) = self.credentials.oauth1_signature(method, url).await? {
            headers.push(("Authorization".to_string(), oauth1_header));
        }
        Ok(headers)
    }

    pub async fn get(&self, relative_path: &str, query: &[(&str, &str)]) -> Result<ResponseHandle, HttpError> {
        self.send(Method::GET, relative_path, query, &[], None).await
    }

    pub async fn post(&self, relative_path: &str, body: Option<Vec<u8>>) -> Result<ResponseHandle, HttpError> {
        self.send(Method::POST, relative_path, &[], &[], body).await
    }

    pub async fn put(&self, relative_path: &str, body: Option<Vec<u8>>) -> Result<ResponseHandle, HttpError> {
        self.send(Method::PUT, relative_path, &[], &[], body).await
    }

    pub async fn patch(&self, relative_path: &str, body: Option<Vec<u8>>) -> Result<ResponseHandle, HttpError> {
        self.send(Method::PATCH, relative_path, &[], &[], body).await
    }

    pub async fn delete(&self, relative_path: &str) -> Result<ResponseHandle, HttpError> {
        self.send(Method::DELETE, relative_path, &[], &[], None).await
    }

    pub async fn head(&self, relative_path: &str) -> Result<ResponseHandle, HttpError> {
        self.send(Method::HEAD, relative_path, &[], &[], None).await
    }

    pub async fn options(&self, relative_path: &str) -> Result<ResponseHandle, HttpError> {
        self.send(Method::OPTIONS, relative_path, &[], &[], None).await
    }

    /// WebDAV `PROPFIND`, used by providers (Dataverse, some storage APIs)
    /// that expose directory listings over WebDAV rather than a JSON API.
    pub async fn propfind(&self, relative_path: &str, body: Option<Vec<u8>>) -> Result<ResponseHandle, HttpError> {
        let method = Method::from_bytes(b"PROPFIND").expect("PROPFIND is a valid HTTP method token");
        self.send(method, relative_path, &[], &[], body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticCredentials(Credentials);

    #[async_trait]
    impl CredentialsProvider for StaticCredentials {
        async fn current(&self) -> Result<Credentials, HttpError> {
            Ok(self.0.clone())
        }
        async fn refresh_oauth2(&self) -> Result<Credentials, HttpError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_send_injects_bearer_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/items"))
            .and(header("Authorization", "Bearer AT1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let prefix = Url::parse(&format!("{}/v2/", server.uri())).unwrap();
        let creds = Arc::new(StaticCredentials(Credentials::AccessToken { token: "AT1".to_string() }));
        let requestor = Requestor::new(prefix, creds, Duration::from_secs(5));

        let resp = requestor.get("items", &[]).await.unwrap();
        assert!(resp.is_success());
    }

    struct Oauth1Credentials;

    #[async_trait]
    impl CredentialsProvider for Oauth1Credentials {
        async fn current(&self) -> Result<Credentials, HttpError> {
            Ok(Credentials::OAuth1 { token: "t".to_string(), token_secret: "s".to_string() })
        }
        async fn refresh_oauth2(&self) -> Result<Credentials, HttpError> {
            unreachable!()
        }
        async fn oauth1_signature(&self, method: &str, url: &str) -> Result<Option<String>, HttpError> {
            Ok(Some(format!("OAuth signed-for-{method}-{url}")))
        }
    }

    #[tokio::test]
    async fn test_send_injects_oauth1_signature_header() {
        let server = MockServer::start().await;
        let prefix = Url::parse(&format!("{}/v2/", server.uri())).unwrap();
        let expected_url = format!("{}/v2/items", server.uri());
        Mock::given(method("GET"))
            .and(path("/v2/items"))
            .and(header("Authorization", format!("OAuth signed-for-GET-{expected_url}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let requestor = Requestor::new(prefix, Arc::new(Oauth1Credentials), Duration::from_secs(5));
        let resp = requestor.get("items", &[]).await.unwrap();
        assert!(resp.is_success());
    }

    #[tokio::test]
    async fn test_send_rejects_escaping_relative_path() {
        let server = MockServer::start().await;
        let prefix = Url::parse(&format!("{}/v2/", server.uri())).unwrap();
        let creds = Arc::new(StaticCredentials(Credentials::AccessToken { token: "AT1".to_string() }));
        let requestor = Requestor::new(prefix, creds, Duration::from_secs(5));

        let err = requestor.get("/etc/passwd", &[]).await.unwrap_err();
        assert!(matches!(err, HttpError::InvalidRelativeUrl(_)));
    }
}
