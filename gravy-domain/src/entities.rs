//! Domain entities (§3). Each maps to one table; invariant-bearing ones
//! (`AuthorizedAccount`, `ConfiguredAddon`, `ExternalCredentialsRecord`)
//! expose constructors/setters that enforce §3/§4.8 rather than leaving
//! validation to callers.

use chrono::{DateTime, Utc};
use gravy_crypto::KeyParameters;
use gravy_oauth::ProviderQuirks;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use crate::capabilities::Capabilities;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("authorized_capabilities must be a subset of the service's supported_capabilities")]
    CapabilitiesExceedService,

    #[error("connected_capabilities must be a subset of the account's authorized_capabilities")]
    CapabilitiesExceedAccount,

    #[error("format tag {record_format:?} does not match the service's credentials_format {service_format:?}")]
    FormatMismatch { record_format: String, service_format: String },
}

/// One of the five credential shapes an `ExternalService` declares up
/// front; `ExternalCredentialsRecord::format` must always agree with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsFormat {
    OAuth2,
    OAuth1a,
    AccessToken,
    UsernamePassword,
    AccessKeySecretKey,
}

/// Issuer details shared by every `ExternalService` that authenticates
/// via the OAuth2 authorization-code grant.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OAuth2ClientConfig {
    pub id: Uuid,
    pub auth_uri: String,
    pub token_uri: String,
    pub redirect_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[sqlx(json)]
    pub quirks: ProviderQuirks,
}

/// Issuer details for the OAuth1a three-legged handshake.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OAuth1ClientConfig {
    pub id: Uuid,
    pub request_token_url: String,
    pub authorize_url: String,
    pub access_token_url: String,
    pub client_key: String,
    pub client_secret: String,
}

/// A provider endpoint, created by administrators and read-only at
/// runtime (§3).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExternalService {
    pub id: Uuid,
    pub display_name: String,
    pub api_base_url: String,
    #[sqlx(json)]
    pub credentials_format: CredentialsFormat,
    pub supported_capabilities: i32,
    /// Stable numeric identifier of the implementation code to use
    /// (`gravy-providers`' registry key), not a foreign key.
    pub implementation_id: i32,
    pub oauth2_client_config_id: Option<Uuid>,
    pub oauth1_client_config_id: Option<Uuid>,
}

impl ExternalService {
    pub fn supported_capabilities(&self) -> Capabilities {
        Capabilities::from_i32(self.supported_capabilities)
    }
}

/// An opaque reference to a user in the parent platform. Unique by URI
/// (§3); deactivation is tracked here rather than deleting the row so
/// owned `AuthorizedAccount`s remain queryable for audit.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserReference {
    pub id: Uuid,
    pub user_uri: String,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl UserReference {
    pub fn is_active(&self) -> bool {
        self.deactivated_at.is_none()
    }
}

/// An opaque reference to a resource (a project, a folder of record) in
/// the parent platform. Unique by URI.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ResourceReference {
    pub id: Uuid,
    pub resource_uri: String,
}

/// The encrypted-at-rest credential blob owned one-to-one by an
/// `AuthorizedAccount` (§3). Decryption and the `Credentials` shape it
/// decrypts to live in `gravy-crypto`; this struct is only the storage
/// row plus the key-derivation parameters used to encrypt it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExternalCredentialsRecord {
    pub id: Uuid,
    #[serde(with = "hex_bytes")]
    pub encrypted_blob: Vec<u8>,
    #[sqlx(json)]
    pub key_params: KeyParameters,
    #[sqlx(json)]
    pub format: CredentialsFormat,
    /// Plaintext copy of the pending OAuth2 state token, indexed for the
    /// `/oauth2/callback` lookup (§6: "ExternalCredentials ... by
    /// `state_token`"). The encrypted blob also carries it on
    /// `Credentials::OAuth2` until the handshake completes; this column
    /// exists only because the blob itself can't be queried by value.
    pub state_token: Option<String>,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// An authenticated connection between a `UserReference` and an
/// `ExternalService`, owning one `ExternalCredentialsRecord` exclusively
/// (§3).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuthorizedAccount {
    pub id: Uuid,
    pub user_reference_id: Uuid,
    pub external_service_id: Uuid,
    pub external_credentials_id: Uuid,
    pub authorized_capabilities: i32,
    pub display_name: String,
    pub default_root_folder: Option<String>,
    pub api_base_url_override: Option<String>,
    pub external_account_id: Option<String>,
}

impl AuthorizedAccount {
    /// Builds a new account, enforcing
    /// `authorized_capabilities ⊆ service.supported_capabilities` (§4.8).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        user_reference_id: Uuid,
        service: &ExternalService,
        external_credentials_id: Uuid,
        authorized_capabilities: Capabilities,
        display_name: String,
        api_base_url_override: Option<String>,
    ) -> Result<Self, DomainError> {
        if !authorized_capabilities.is_subset_of(service.supported_capabilities()) {
            return Err(DomainError::CapabilitiesExceedService);
        }
        Ok(Self {
            id,
            user_reference_id,
            external_service_id: service.id,
            external_credentials_id,
            authorized_capabilities: authorized_capabilities.as_i32(),
            display_name,
            default_root_folder: None,
            api_base_url_override,
            external_account_id: None,
        })
    }

    pub fn authorized_capabilities(&self) -> Capabilities {
        Capabilities::from_i32(self.authorized_capabilities)
    }

    /// Re-validates `authorized_capabilities` against a (possibly
    /// updated) service, for use before persisting a capability grant.
    pub fn set_authorized_capabilities(
        &mut self,
        capabilities: Capabilities,
        service: &ExternalService,
    ) -> Result<(), DomainError> {
        if !capabilities.is_subset_of(service.supported_capabilities()) {
            return Err(DomainError::CapabilitiesExceedService);
        }
        self.authorized_capabilities = capabilities.as_i32();
        Ok(())
    }
}

/// A link between an `AuthorizedAccount` and a `ResourceReference` (§3).
/// Destroyed, not just deactivated, when either side is destroyed —
/// unlike `AuthorizedAccount`'s soft user-deactivation handling.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ConfiguredAddon {
    pub id: Uuid,
    pub base_account_id: Uuid,
    pub resource_reference_id: Uuid,
    pub connected_capabilities: i32,
    pub root_folder: Option<String>,
    pub display_name: String,
}

impl ConfiguredAddon {
    /// Enforces `connected_capabilities ⊆ account.authorized_capabilities`
    /// (§4.8).
    pub fn new(
        id: Uuid,
        account: &AuthorizedAccount,
        resource_reference_id: Uuid,
        connected_capabilities: Capabilities,
        root_folder: Option<String>,
        display_name: String,
    ) -> Result<Self, DomainError> {
        if !connected_capabilities.is_subset_of(account.authorized_capabilities()) {
            return Err(DomainError::CapabilitiesExceedAccount);
        }
        Ok(Self {
            id,
            base_account_id: account.id,
            resource_reference_id,
            connected_capabilities: connected_capabilities.as_i32(),
            root_folder,
            display_name,
        })
    }

    pub fn connected_capabilities(&self) -> Capabilities {
        Capabilities::from_i32(self.connected_capabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(supported: Capabilities) -> ExternalService {
        ExternalService {
            id: Uuid::new_v4(),
            display_name: "Example Storage".to_string(),
            api_base_url: "https://api.example.com/v2/".to_string(),
            credentials_format: CredentialsFormat::OAuth2,
            supported_capabilities: supported.as_i32(),
            implementation_id: 1,
            oauth2_client_config_id: None,
            oauth1_client_config_id: None,
        }
    }

    #[test]
    fn test_account_rejects_capabilities_beyond_service() {
        let service = service(Capabilities::ACCESS);
        let err = AuthorizedAccount::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            &service,
            Uuid::new_v4(),
            Capabilities::ACCESS | Capabilities::UPDATE,
            "My Account".to_string(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, DomainError::CapabilitiesExceedService);
    }

    #[test]
    fn test_account_accepts_capabilities_within_service() {
        let service = service(Capabilities::ACCESS | Capabilities::UPDATE);
        let account = AuthorizedAccount::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            &service,
            Uuid::new_v4(),
            Capabilities::ACCESS,
            "My Account".to_string(),
            None,
        )
        .unwrap();
        assert!(account.authorized_capabilities().contains(Capabilities::ACCESS));
    }

    #[test]
    fn test_addon_rejects_capabilities_beyond_account() {
        let service = service(Capabilities::ACCESS | Capabilities::UPDATE);
        let account = AuthorizedAccount::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            &service,
            Uuid::new_v4(),
            Capabilities::ACCESS,
            "My Account".to_string(),
            None,
        )
        .unwrap();

        let err =
            ConfiguredAddon::new(Uuid::new_v4(), &account, Uuid::new_v4(), Capabilities::UPDATE, None, "My Addon".to_string())
                .unwrap_err();
        assert_eq!(err, DomainError::CapabilitiesExceedAccount);
    }

    #[test]
    fn test_deactivated_user_reference_is_not_active() {
        let user = UserReference { id: Uuid::new_v4(), user_uri: "https://osf.io/users/abc".to_string(), deactivated_at: Some(Utc::now()) };
        assert!(!user.is_active());
    }
}
