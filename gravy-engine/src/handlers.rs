//! Maps a bound operation invocation onto the matching provider trait
//! method and shapes its result back to JSON. Result shaping follows the
//! symmetrical rule in §4.6 ("dataclass → object by field, enum → name,
//! container → array"); since every provider return type here already
//! derives `Serialize` with `#[serde(rename_all = "snake_case")]` on its
//! enums, that rule is just `serde_json::to_value`.

use serde_json::Value;
use shared::errors::ApiError;
use std::collections::HashMap;

use crate::binding::{optional_string_arg, string_arg};
use crate::factory::ProviderInstance;
use gravy_providers::ProviderError;

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::InternalError { message: e.to_string() })
}

fn map_provider_error(e: ProviderError) -> ApiError {
    match e {
        ProviderError::Http(http) => ApiError::ProviderError { provider_status: 502, message: http.to_string() },
        ProviderError::MalformedResponse(message) => ApiError::UnexpectedAddonError { message },
        ProviderError::InvalidItemId(item_id) => ApiError::InvalidArguments { message: format!("invalid item id: {item_id}") },
        ProviderError::NotFound(resource) => ApiError::NotFound { resource },
    }
}

/// Runs `"<interface>:<operation>"` against a constructed provider
/// instance with already-bound arguments, returning the JSON result.
pub async fn dispatch(qualified_name: &str, provider: &ProviderInstance, args: &HashMap<String, Value>) -> Result<Value, ApiError> {
    match (qualified_name, provider) {
        ("storage:get_root_items", ProviderInstance::Storage(storage)) => {
            let cursor = optional_string_arg(args, "page_cursor");
            to_json(&storage.get_root_items(&cursor).await.map_err(map_provider_error)?)
        }
        ("storage:list_child_items", ProviderInstance::Storage(storage)) => {
            let item_id = string_arg(args, "item_id")?;
            let cursor = optional_string_arg(args, "page_cursor");
            to_json(&storage.list_child_items(&item_id, &cursor).await.map_err(map_provider_error)?)
        }
        ("storage:delete_item", ProviderInstance::Storage(storage)) => {
            let item_id = string_arg(args, "item_id")?;
            storage.delete_item(&item_id).await.map_err(map_provider_error)?;
            to_json(&serde_json::json!({}))
        }
        ("citation:get_external_account_id", ProviderInstance::Citation(citation)) => {
            to_json(&citation.get_external_account_id().await.map_err(map_provider_error)?)
        }
        ("citation:list_root_collections", ProviderInstance::Citation(citation)) => {
            to_json(&citation.list_root_collections().await.map_err(map_provider_error)?)
        }
        ("citation:list_collection_items", ProviderInstance::Citation(citation)) => {
            let collection_id = string_arg(args, "collection_id")?;
            to_json(&citation.list_collection_items(&collection_id).await.map_err(map_provider_error)?)
        }
        ("link:build_url_for_id", ProviderInstance::Link(link)) => {
            let item_id = string_arg(args, "item_id")?;
            to_json(&link.build_url_for_id(&item_id).await.map_err(map_provider_error)?)
        }
        ("link:get_external_account_id", ProviderInstance::Link(link)) => {
            to_json(&link.get_external_account_id().await.map_err(map_provider_error)?)
        }
        ("link:list_root_items", ProviderInstance::Link(link)) => {
            let cursor = optional_string_arg(args, "page_cursor");
            to_json(&link.list_root_items(&cursor).await.map_err(map_provider_error)?)
        }
        ("link:list_child_items", ProviderInstance::Link(link)) => {
            let item_id = string_arg(args, "item_id")?;
            let cursor = optional_string_arg(args, "page_cursor");
            to_json(&link.list_child_items(&item_id, &cursor).await.map_err(map_provider_error)?)
        }
        (name, _) => Err(ApiError::InvalidArguments { message: format!("operation {name:?} is not implemented by this provider's interface") }),
    }
}
