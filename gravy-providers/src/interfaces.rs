//! The addon interfaces providers implement (`storage`, `citation`,
//! `link`), and the item shape their operations return. One canonical
//! `Item` shape covers what all three interfaces need rather than a
//! separate dataclass per interface, since the fields that differ
//! (`csl`, `doi`, `item_link`) are simply absent for interfaces that
//! don't use them.

use async_trait::async_trait;
use gravy_http::HttpError;
use gravy_pagination::ItemSampleResult;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("provider response did not match the expected shape: {0}")]
    MalformedResponse(String),

    #[error("invalid item id: {0}")]
    InvalidItemId(String),

    #[error("item not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Folder,
    File,
    Collection,
    Document,
    Resource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    pub item_name: String,
    pub item_type: ItemType,
    /// CSL-JSON, for citation providers only.
    pub csl: Option<serde_json::Value>,
    pub doi: Option<String>,
    pub item_link: Option<String>,
}

impl Item {
    pub fn new(item_id: impl Into<String>, item_name: impl Into<String>, item_type: ItemType) -> Self {
        Self { item_id: item_id.into(), item_name: item_name.into(), item_type, csl: None, doi: None, item_link: None }
    }
}

#[async_trait]
pub trait StorageAddon: Send + Sync {
    async fn get_root_items(&self, page_cursor: &str) -> Result<ItemSampleResult<Item>, ProviderError>;
    async fn list_child_items(&self, item_id: &str, page_cursor: &str) -> Result<ItemSampleResult<Item>, ProviderError>;

    /// Removes an item from the provider, an `UPDATE`-capability operation
    /// (`addon_toolkit/interfaces/storage.py`'s `pls_delete_item`).
    async fn delete_item(&self, item_id: &str) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait CitationAddon: Send + Sync {
    async fn get_external_account_id(&self) -> Result<String, ProviderError>;
    async fn list_root_collections(&self) -> Result<ItemSampleResult<Item>, ProviderError>;
    async fn list_collection_items(&self, collection_id: &str) -> Result<ItemSampleResult<Item>, ProviderError>;
}

#[async_trait]
pub trait LinkAddon: Send + Sync {
    async fn build_url_for_id(&self, item_id: &str) -> Result<String, ProviderError>;
    async fn get_external_account_id(&self) -> Result<String, ProviderError>;
    async fn list_root_items(&self, page_cursor: &str) -> Result<ItemSampleResult<Item>, ProviderError>;
    async fn list_child_items(&self, item_id: &str, page_cursor: &str) -> Result<ItemSampleResult<Item>, ProviderError>;
}
