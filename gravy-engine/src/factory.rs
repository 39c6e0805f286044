//! Addon Instance Factory (C5, §4.5): given a service + account (+
//! optional addon), builds the one provider instance the invocation
//! needs. Every provider here is a "network-requestor provider" —
//! constructed with a [`ProviderConfig`] and a C1 `Requestor` bound to
//! the account's credentials — since none of the three representative
//! providers need a specialized SDK client.
//!
//! The factory is pure for a given `(account, addon, config snapshot)`
//! and produces a fresh instance per invocation; providers must not
//! retain state between calls, so nothing here is cached or reused.

use gravy_domain::entities::{AuthorizedAccount, ConfiguredAddon, ExternalService};
use gravy_http::{CredentialsProvider, Requestor};
use gravy_providers::box_dot_com::BoxDotComStorage;
use gravy_providers::zenodo::ZenodoLink;
use gravy_providers::zotero::ZoteroCitation;
use gravy_providers::{CitationAddon, LinkAddon, ProviderConfig, StorageAddon};
use shared::errors::ApiError;
use std::sync::Arc;
use std::time::Duration;

/// Stable `ExternalService.implementation_id` values, doubling as the
/// `gravy-operations` registry's `ProviderId` for the same provider.
pub const IMPLEMENTATION_BOX_DOT_COM: i32 = 1;
pub const IMPLEMENTATION_ZOTERO: i32 = 2;
pub const IMPLEMENTATION_ZENODO: i32 = 3;

/// One constructed provider, tagged by the interface it implements. The
/// invocation engine picks the handler that matches the requested
/// operation's interface and downcasts via this enum rather than a
/// single trait object, since the three interfaces have disjoint method
/// sets.
pub enum ProviderInstance {
    Storage(Arc<dyn StorageAddon>),
    Citation(Arc<dyn CitationAddon>),
    Link(Arc<dyn LinkAddon>),
}

impl std::fmt::Debug for ProviderInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderInstance::Storage(_) => f.write_str("ProviderInstance::Storage(..)"),
            ProviderInstance::Citation(_) => f.write_str("ProviderInstance::Citation(..)"),
            ProviderInstance::Link(_) => f.write_str("ProviderInstance::Link(..)"),
        }
    }
}

pub struct AddonInstanceFactory;

impl AddonInstanceFactory {
    pub fn build(
        service: &ExternalService,
        account: &AuthorizedAccount,
        addon: Option<&ConfiguredAddon>,
        credentials: Arc<dyn CredentialsProvider>,
        http_timeout: Duration,
    ) -> Result<ProviderInstance, ApiError> {
        let base_url = account.api_base_url_override.as_deref().unwrap_or(&service.api_base_url);
        let prefix_url = reqwest::Url::parse(base_url).map_err(|e| ApiError::InternalError {
            message: format!("invalid service api_base_url {base_url:?}: {e}"),
        })?;
        let requestor = Arc::new(Requestor::new(prefix_url, credentials, http_timeout));

        let config = ProviderConfig {
            service_api_base_url: account.api_base_url_override.clone(),
            connected_root_id: addon
                .and_then(|a| a.root_folder.clone())
                .or_else(|| account.default_root_folder.clone()),
            external_account_id: account.external_account_id.clone(),
            max_upload_mb: None,
            external_web_url: None,
        };

        match service.implementation_id {
            IMPLEMENTATION_BOX_DOT_COM => {
                Ok(ProviderInstance::Storage(Arc::new(BoxDotComStorage::new(requestor, config))))
            }
            IMPLEMENTATION_ZOTERO => Ok(ProviderInstance::Citation(Arc::new(ZoteroCitation::new(requestor, config)))),
            IMPLEMENTATION_ZENODO => Ok(ProviderInstance::Link(Arc::new(ZenodoLink::new(requestor, config)))),
            other => {
                Err(ApiError::InternalError { message: format!("no provider implementation registered for id {other}") })
            }
        }
    }
}
