//! Request handlers (§6): extract → authorize against the caller → call
//! the invocation engine → shape the response. Mirrors `auth-service`'s
//! handler signature, `async fn(state, body) -> Result<HttpResponse, ApiError>`.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use shared::caller::CallerContext;
use shared::config::AppConfig;
use shared::database;
use shared::errors::ApiError;
use uuid::Uuid;
use validator::Validate;

use super::dto::{HealthResponse, InvocationResponse, InvokeRequest, OAuth1CallbackQuery, OAuth2CallbackQuery, OAuthCallbackResponse};
use crate::state::AppState;
use crate::waterbutler::{self, SignatureError};

pub async fn health_check(state: web::Data<AppState>, config: web::Data<AppConfig>) -> Result<HttpResponse, ApiError> {
    database::health_check(&state.db_pool).await?;
    Ok(HttpResponse::Ok().json(HealthResponse { status: "healthy", service: config.service_name.clone() }))
}

/// Verifies the caller's platform identity owns `account_id` before the
/// engine ever sees the request (§4.8: accounts belong to exactly one
/// `UserReference`).
async fn authorize_account(state: &AppState, caller: &CallerContext, account_id: Uuid) -> Result<(), ApiError> {
    let user = state.user_references.find_or_create(&caller.user_uri).await?;
    let account = state
        .accounts
        .find_by_id(account_id)
        .await?
        .ok_or_else(|| ApiError::NotFound { resource: format!("account {account_id}") })?;
    if account.user_reference_id != user.id {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

pub async fn invoke(
    state: web::Data<AppState>,
    caller: CallerContext,
    body: web::Json<InvokeRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate()?;

    authorize_account(&state, &caller, body.account_id).await?;

    let invocation = state
        .engine
        .submit(&body.operation, body.account_id, body.configured_addon_id, body.arguments.clone())
        .await?;

    Ok(HttpResponse::Ok().json(InvocationResponse::from(invocation)))
}

pub async fn get_invocation(
    state: web::Data<AppState>,
    caller: CallerContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let invocation_id = path.into_inner();
    let invocation = state
        .engine
        .find_invocation(invocation_id)
        .await?
        .ok_or_else(|| ApiError::NotFound { resource: format!("invocation {invocation_id}") })?;

    authorize_account(&state, &caller, invocation.account_id).await?;

    Ok(HttpResponse::Ok().json(InvocationResponse::from(invocation)))
}

/// `GET /oauth2/callback` (§6): resolves the pending handshake by its
/// `state` token, exchanges the authorization code, and writes the
/// resulting access/refresh token pair onto the account's
/// `ExternalCredentials`.
pub async fn oauth2_callback(
    state: web::Data<AppState>,
    query: web::Query<OAuth2CallbackQuery>,
) -> Result<HttpResponse, ApiError> {
    let record = state
        .credentials
        .find_by_state_token(&query.state)
        .await?
        .ok_or_else(|| ApiError::NotFound { resource: format!("oauth2 handshake for state {}", query.state) })?;

    let account = state
        .accounts
        .find_by_external_credentials_id(record.id)
        .await?
        .ok_or_else(|| ApiError::NotFound { resource: format!("account owning credentials {}", record.id) })?;

    let service = state
        .services
        .find_by_id(account.external_service_id)
        .await?
        .ok_or_else(|| ApiError::NotFound { resource: format!("service {}", account.external_service_id) })?;

    let client_config_id = service.oauth2_client_config_id.ok_or_else(|| ApiError::InternalError {
        message: format!("service {} has no oauth2 client config", service.id),
    })?;
    let client_config = state
        .oauth2_clients
        .find_by_id(client_config_id)
        .await?
        .ok_or_else(|| ApiError::NotFound { resource: format!("oauth2 client config {client_config_id}") })?;

    let credentials = gravy_oauth::oauth2::exchange_authorization_code(
        &state.http_client,
        &client_config.token_uri,
        &client_config.client_id,
        &client_config.client_secret,
        &query.code,
        &client_config.redirect_uri,
    )
    .await
    .map_err(|e| ApiError::CredentialError { message: e.to_string() })?;

    let encrypted = state
        .cipher
        .encrypt_json(&credentials, &record.key_params)
        .map_err(|e| ApiError::InternalError { message: e.to_string() })?;
    state.credentials.complete_oauth2_exchange(record.id, encrypted, &record.key_params).await?;

    Ok(HttpResponse::Ok().json(OAuthCallbackResponse { status: "connected" }))
}

/// `GET /oauth1/callback` (§6): correlates the callback to its handshake
/// via the server-side Redis session key (keyed by the request token
/// itself, the value the provider echoes back as `oauth_token`), then
/// exchanges the verified request token for a permanent access token.
pub async fn oauth1_callback(
    state: web::Data<AppState>,
    query: web::Query<OAuth1CallbackQuery>,
) -> Result<HttpResponse, ApiError> {
    let handshake = state
        .redis
        .take_oauth1_handshake(&query.oauth_token)
        .await?
        .ok_or_else(|| ApiError::NotFound { resource: format!("oauth1 handshake for token {}", query.oauth_token) })?;

    let account = state
        .accounts
        .find_by_id(handshake.account_id)
        .await?
        .ok_or_else(|| ApiError::NotFound { resource: format!("account {}", handshake.account_id) })?;

    let service = state
        .services
        .find_by_id(account.external_service_id)
        .await?
        .ok_or_else(|| ApiError::NotFound { resource: format!("service {}", account.external_service_id) })?;

    let client_config_id = service.oauth1_client_config_id.ok_or_else(|| ApiError::InternalError {
        message: format!("service {} has no oauth1 client config", service.id),
    })?;
    let client_config = state
        .oauth1_clients
        .find_by_id(client_config_id)
        .await?
        .ok_or_else(|| ApiError::NotFound { resource: format!("oauth1 client config {client_config_id}") })?;

    let credentials = gravy_oauth::oauth1::get_access_token(
        &state.http_client,
        &client_config.access_token_url,
        &client_config.client_key,
        &client_config.client_secret,
        &query.oauth_token,
        &handshake.request_token_secret,
        &query.oauth_verifier,
    )
    .await
    .map_err(|e| ApiError::CredentialError { message: e.to_string() })?;

    let record = state
        .credentials
        .find_by_id(account.external_credentials_id)
        .await?
        .ok_or_else(|| ApiError::NotFound { resource: format!("credentials {}", account.external_credentials_id) })?;
    let encrypted = state
        .cipher
        .encrypt_json(&credentials, &record.key_params)
        .map_err(|e| ApiError::InternalError { message: e.to_string() })?;
    state.credentials.update_blob(record.id, encrypted, &record.key_params).await?;

    Ok(HttpResponse::Ok().json(OAuthCallbackResponse { status: "connected" }))
}

fn map_signature_error(e: SignatureError) -> ApiError {
    match e {
        SignatureError::ExpiredTimestamp => ApiError::Unauthorized,
        SignatureError::Mismatch => ApiError::Unauthorized,
        SignatureError::InvalidKey | SignatureError::InvalidEncoding => {
            ApiError::BadRequest { message: e.to_string() }
        }
    }
}

/// `POST /api/v1/waterbutler/invocations`: the Waterbutler-compatibility
/// surface (§6). Waterbutler calls in as a trusted system peer rather
/// than a logged-in platform user, so it authenticates with an
/// HMAC-SHA256 request signature instead of a forwarded `CallerContext`.
pub async fn waterbutler_invoke(
    req: HttpRequest,
    state: web::Data<AppState>,
    config: web::Data<AppConfig>,
    body: web::Json<InvokeRequest>,
) -> Result<HttpResponse, ApiError> {
    let timestamp_header = req
        .headers()
        .get("X-Waterbutler-Timestamp")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    let timestamp: i64 = timestamp_header.parse().map_err(|_| ApiError::Unauthorized)?;

    let signature = req
        .headers()
        .get("X-Waterbutler-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    waterbutler::verify(
        config.invocation.waterbutler_hmac_secret.as_bytes(),
        req.method().as_str(),
        req.path(),
        timestamp,
        Utc::now().timestamp(),
        config.invocation.waterbutler_hmac_window_seconds,
        signature,
    )
    .map_err(map_signature_error)?;

    body.validate()?;

    let invocation = state
        .engine
        .submit(&body.operation, body.account_id, body.configured_addon_id, body.arguments.clone())
        .await?;

    Ok(HttpResponse::Ok().json(InvocationResponse::from(invocation)))
}
