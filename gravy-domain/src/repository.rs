//! Data access for the domain entities (§3), following `auth-service`'s
//! `UserRepository` pattern: one concrete `PgPool`-backed struct per
//! aggregate, plain parameterized queries, `RETURNING *` on writes.

use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{
    AuthorizedAccount, ConfiguredAddon, ExternalCredentialsRecord, ExternalService, OAuth1ClientConfig,
    OAuth2ClientConfig, UserReference,
};

fn map_db_error(e: sqlx::Error) -> ApiError {
    ApiError::DatabaseError(e)
}

#[derive(Debug, Clone)]
pub struct ExternalServiceRepository {
    pool: PgPool,
}

impl ExternalServiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ExternalService>, ApiError> {
        sqlx::query_as::<_, ExternalService>("SELECT * FROM external_services WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }
}

#[derive(Debug, Clone)]
pub struct UserReferenceRepository {
    pool: PgPool,
}

impl UserReferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Finds the `UserReference` for a platform user URI, creating one on
    /// first sight — the gateway never mints these ahead of time.
    pub async fn find_or_create(&self, user_uri: &str) -> Result<UserReference, ApiError> {
        if let Some(existing) = sqlx::query_as::<_, UserReference>("SELECT * FROM user_references WHERE user_uri = $1")
            .bind(user_uri)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
        {
            return Ok(existing);
        }

        sqlx::query_as::<_, UserReference>(
            "INSERT INTO user_references (id, user_uri) VALUES ($1, $2) \
             ON CONFLICT (user_uri) DO UPDATE SET user_uri = EXCLUDED.user_uri \
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_uri)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    /// Deactivates a user (§4.8: "deactivation propagates"). Accounts
    /// remain in storage for audit; listing queries elsewhere are
    /// responsible for filtering on `deactivated_at IS NULL`.
    pub async fn deactivate(&self, id: Uuid) -> Result<UserReference, ApiError> {
        sqlx::query_as::<_, UserReference>(
            "UPDATE user_references SET deactivated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    /// Merges `from_user` into `into_user`: reassigns `from_user`'s
    /// accounts, then deactivates `from_user` (§4.8). Runs as a single
    /// transaction so a crash mid-merge can't leave accounts orphaned.
    pub async fn merge(&self, from_user: Uuid, into_user: Uuid) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        sqlx::query("UPDATE authorized_accounts SET user_reference_id = $1 WHERE user_reference_id = $2")
            .bind(into_user)
            .bind(from_user)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        sqlx::query("UPDATE user_references SET deactivated_at = NOW() WHERE id = $1")
            .bind(from_user)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizedAccountRepository {
    pool: PgPool,
}

impl AuthorizedAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, account: &AuthorizedAccount) -> Result<AuthorizedAccount, ApiError> {
        sqlx::query_as::<_, AuthorizedAccount>(
            r#"
            INSERT INTO authorized_accounts (
                id, user_reference_id, external_service_id, external_credentials_id,
                authorized_capabilities, display_name, default_root_folder,
                api_base_url_override, external_account_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(account.id)
        .bind(account.user_reference_id)
        .bind(account.external_service_id)
        .bind(account.external_credentials_id)
        .bind(account.authorized_capabilities)
        .bind(&account.display_name)
        .bind(&account.default_root_folder)
        .bind(&account.api_base_url_override)
        .bind(&account.external_account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<AuthorizedAccount>, ApiError> {
        sqlx::query_as::<_, AuthorizedAccount>("SELECT * FROM authorized_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    /// Active accounts for a user: the "active listings" view §4.8
    /// requires deactivated users' accounts be filtered out of.
    pub async fn list_active_for_user(&self, user_reference_id: Uuid) -> Result<Vec<AuthorizedAccount>, ApiError> {
        sqlx::query_as::<_, AuthorizedAccount>(
            r#"
            SELECT aa.* FROM authorized_accounts aa
            JOIN user_references ur ON ur.id = aa.user_reference_id
            WHERE aa.user_reference_id = $1 AND ur.deactivated_at IS NULL
            "#,
        )
        .bind(user_reference_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    /// The account that exclusively owns a given credentials record —
    /// the reverse lookup the OAuth callbacks need to get from a resolved
    /// `ExternalCredentialsRecord` back to the account it belongs to.
    pub async fn find_by_external_credentials_id(
        &self,
        external_credentials_id: Uuid,
    ) -> Result<Option<AuthorizedAccount>, ApiError> {
        sqlx::query_as::<_, AuthorizedAccount>("SELECT * FROM authorized_accounts WHERE external_credentials_id = $1")
            .bind(external_credentials_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }
}

#[derive(Debug, Clone)]
pub struct ConfiguredAddonRepository {
    pool: PgPool,
}

impl ConfiguredAddonRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, addon: &ConfiguredAddon) -> Result<ConfiguredAddon, ApiError> {
        sqlx::query_as::<_, ConfiguredAddon>(
            r#"
            INSERT INTO configured_addons (
                id, base_account_id, resource_reference_id, connected_capabilities,
                root_folder, display_name
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(addon.id)
        .bind(addon.base_account_id)
        .bind(addon.resource_reference_id)
        .bind(addon.connected_capabilities)
        .bind(&addon.root_folder)
        .bind(&addon.display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ConfiguredAddon>, ApiError> {
        sqlx::query_as::<_, ConfiguredAddon>("SELECT * FROM configured_addons WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    /// Destroys the addon — called when either the resource or the
    /// backing account is destroyed (§3 lifecycle note).
    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM configured_addons WHERE id = $1").bind(id).execute(&self.pool).await.map_err(map_db_error)?;
        Ok(())
    }
}

/// Issuer configuration for the OAuth2 authorization-code grant (§4.3),
/// administrator-managed and read-only at runtime like `ExternalService`.
#[derive(Debug, Clone)]
pub struct OAuth2ClientConfigRepository {
    pool: PgPool,
}

impl OAuth2ClientConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<OAuth2ClientConfig>, ApiError> {
        sqlx::query_as::<_, OAuth2ClientConfig>("SELECT * FROM oauth2_client_configs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }
}

/// Issuer configuration for the OAuth1a three-legged handshake (§4.3).
#[derive(Debug, Clone)]
pub struct OAuth1ClientConfigRepository {
    pool: PgPool,
}

impl OAuth1ClientConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<OAuth1ClientConfig>, ApiError> {
        sqlx::query_as::<_, OAuth1ClientConfig>("SELECT * FROM oauth1_client_configs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }
}

#[derive(Debug, Clone)]
pub struct ExternalCredentialsRepository {
    pool: PgPool,
}

impl ExternalCredentialsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ExternalCredentialsRecord>, ApiError> {
        sqlx::query_as::<_, ExternalCredentialsRecord>("SELECT * FROM external_credentials WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    pub async fn create(&self, record: &ExternalCredentialsRecord) -> Result<ExternalCredentialsRecord, ApiError> {
        sqlx::query_as::<_, ExternalCredentialsRecord>(
            "INSERT INTO external_credentials (id, encrypted_blob, key_params, format, state_token) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(record.id)
        .bind(&record.encrypted_blob)
        .bind(sqlx::types::Json(&record.key_params))
        .bind(sqlx::types::Json(&record.format))
        .bind(&record.state_token)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    /// Overwrites the encrypted blob and key params in place (rotation,
    /// refresh) — never the `id`, since `AuthorizedAccount` owns it by
    /// reference.
    pub async fn update_blob(
        &self,
        id: Uuid,
        encrypted_blob: Vec<u8>,
        key_params: &gravy_crypto::KeyParameters,
    ) -> Result<ExternalCredentialsRecord, ApiError> {
        sqlx::query_as::<_, ExternalCredentialsRecord>(
            "UPDATE external_credentials SET encrypted_blob = $1, key_params = $2 WHERE id = $3 RETURNING *",
        )
        .bind(encrypted_blob)
        .bind(sqlx::types::Json(key_params))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    /// The `/oauth2/callback` lookup: resolves the pending handshake by
    /// its state token (§6's required `state_token` index).
    pub async fn find_by_state_token(&self, state_token: &str) -> Result<Option<ExternalCredentialsRecord>, ApiError> {
        sqlx::query_as::<_, ExternalCredentialsRecord>("SELECT * FROM external_credentials WHERE state_token = $1")
            .bind(state_token)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    /// Writes the exchanged OAuth2 tokens in place and clears the
    /// state_token index — the handshake is complete, so there is nothing
    /// left for `find_by_state_token` to resolve against, and a replayed
    /// callback for the same state must not re-resolve to this record.
    pub async fn complete_oauth2_exchange(
        &self,
        id: Uuid,
        encrypted_blob: Vec<u8>,
        key_params: &gravy_crypto::KeyParameters,
    ) -> Result<ExternalCredentialsRecord, ApiError> {
        sqlx::query_as::<_, ExternalCredentialsRecord>(
            "UPDATE external_credentials SET encrypted_blob = $1, key_params = $2, state_token = NULL WHERE id = $3 RETURNING *",
        )
        .bind(encrypted_blob)
        .bind(sqlx::types::Json(key_params))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }
}
