//! Shared application state injected into every request handler, the
//! same `web::Data<AppState>` pattern `auth-service` uses.

use gravy_crypto::Cipher;
use gravy_domain::repository::{
    AuthorizedAccountRepository, ExternalCredentialsRepository, ExternalServiceRepository,
    OAuth1ClientConfigRepository, OAuth2ClientConfigRepository, UserReferenceRepository,
};
use gravy_engine::InvocationEngine;
use shared::redis_client::RedisClient;
use sqlx::PgPool;
use std::sync::Arc;

pub struct AppState {
    pub engine: Arc<InvocationEngine>,
    pub accounts: AuthorizedAccountRepository,
    pub user_references: UserReferenceRepository,
    pub db_pool: PgPool,
    /// The repositories and crypto/HTTP handles the OAuth callback
    /// handlers need beyond what the invocation engine already owns
    /// internally (§6 "OAuth callbacks").
    pub services: ExternalServiceRepository,
    pub credentials: ExternalCredentialsRepository,
    pub oauth2_clients: OAuth2ClientConfigRepository,
    pub oauth1_clients: OAuth1ClientConfigRepository,
    pub cipher: Arc<Cipher>,
    pub http_client: reqwest::Client,
    pub redis: RedisClient,
}
