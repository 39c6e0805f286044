//! The `Config` struct a network-requestor provider is constructed with
//! (§4.5): everything about the account/addon that isn't a credential.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base API URL for "hosted" services that configure their own
    /// instance (e.g. a self-hosted GitLab); `None` uses the provider's
    /// compiled-in default.
    pub service_api_base_url: Option<String>,
    pub connected_root_id: Option<String>,
    pub external_account_id: Option<String>,
    pub max_upload_mb: Option<u64>,
    /// User-facing base URL for building links back to the provider
    /// (distinct from the API base — used by `zenodo`'s `build_url_for_id`).
    pub external_web_url: Option<String>,
}
