//! Per-provider OAuth2 quirks (§4.3.5): most providers follow RFC 6749
//! closely enough that the generic flow in [`crate::oauth2`] just works,
//! but a handful need small deviations flagged at the `OAuth2ClientConfig`
//! level rather than hardcoded per-provider in the flow itself.

use serde::{Deserialize, Serialize};

/// Bit-flag set of provider deviations from the generic OAuth2 flow.
/// Stored alongside an `ExternalService`'s `OAuth2ClientConfig` and
/// consulted by the refresh/exchange logic, never by provider
/// implementations directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderQuirks {
    /// The provider issues access tokens that never expire and has no
    /// refresh endpoint at all — treat the access token like a personal
    /// access token and never attempt a refresh.
    #[serde(default)]
    pub access_token_only: bool,

    /// The provider's refresh response omits `refresh_token` because the
    /// original one remains valid indefinitely, rather than because it
    /// forgot to rotate it. Distinguishes "keep reusing the old one" from
    /// a provider that silently invalidated it.
    #[serde(default)]
    pub non_expiring_refresh_token: bool,

    /// The provider rejects a comma-joined `scope` parameter and expects
    /// space-separated scopes instead, per RFC 6749 §3.3 (some providers,
    /// notably ones built against OAuth2 in its earlier drafts, still
    /// expect the comma-joined form `build_auth_url` defaults to).
    #[serde(default)]
    pub space_separated_scopes: bool,
}

impl ProviderQuirks {
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether [`crate::refresh::SingleFlightRefresher`] should even
    /// attempt a refresh for credentials carrying this quirk set.
    pub fn should_refresh(&self) -> bool {
        !self.access_token_only
    }

    pub fn join_scopes(&self, scopes: &[String]) -> String {
        let separator = if self.space_separated_scopes { " " } else { "," };
        scopes.join(separator)
    }
}
