//! Request/response DTOs for the invocation API (§6: the JSON-over-HTTP
//! wire shape operations are invoked through).

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// `POST /api/v1/invocations` body. `operation` is the
/// `"<interface>:<operation>"` qualified name from §4.4/§6.
#[derive(Debug, Deserialize, Validate)]
pub struct InvokeRequest {
    #[validate(length(min = 1))]
    pub operation: String,
    pub account_id: Uuid,
    #[serde(default)]
    pub configured_addon_id: Option<Uuid>,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct InvocationResponse {
    pub id: Uuid,
    pub operation: String,
    pub state: String,
    pub result: Option<serde_json::Value>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

impl From<gravy_engine::OperationInvocation> for InvocationResponse {
    fn from(invocation: gravy_engine::OperationInvocation) -> Self {
        let state = serde_json::to_value(invocation.state)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            id: invocation.id,
            operation: invocation.operation_name,
            state,
            result: invocation.result,
            error_kind: invocation.error_kind,
            error_message: invocation.error_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
}

/// `GET /oauth2/callback` query parameters (§6).
#[derive(Debug, Deserialize)]
pub struct OAuth2CallbackQuery {
    pub state: String,
    pub code: String,
}

/// `GET /oauth1/callback` query parameters (§6).
#[derive(Debug, Deserialize)]
pub struct OAuth1CallbackQuery {
    pub oauth_token: String,
    pub oauth_verifier: String,
}

#[derive(Debug, Serialize)]
pub struct OAuthCallbackResponse {
    pub status: &'static str,
}
