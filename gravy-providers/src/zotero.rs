//! Citations on zotero.org (`addon_imps/citations/zotero_org.py`). Zotero
//! has no real "root folder" — `list_root_collections` lists the groups
//! the account can see plus a synthetic "My Library" entry, and item ids
//! are `"<library>:<key>"` pairs so later calls know which library a
//! collection or document lives in.

use async_trait::async_trait;
use gravy_http::Requestor;
use gravy_pagination::{Cursor, ItemSampleResult};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::interfaces::{CitationAddon, Item, ItemType, ProviderError};

pub struct ZoteroCitation {
    requestor: Arc<Requestor>,
    config: ProviderConfig,
}

impl ZoteroCitation {
    pub fn new(requestor: Arc<Requestor>, config: ProviderConfig) -> Self {
        Self { requestor, config }
    }

    fn external_account_id(&self) -> Result<&str, ProviderError> {
        self.config
            .external_account_id
            .as_deref()
            .ok_or_else(|| ProviderError::MalformedResponse("zotero account has no external_account_id".to_string()))
    }

    fn resolve_collection_prefix(&self, library: &str, collection: &str) -> Result<String, ProviderError> {
        let mut prefix = if library == "personal" {
            format!("users/{}", self.external_account_id()?)
        } else {
            format!("groups/{library}")
        };
        if collection != "ROOT" {
            prefix = format!("{prefix}/collections/{collection}");
        }
        Ok(prefix)
    }
}

#[derive(Debug, Deserialize)]
struct ZoteroGroup {
    id: u64,
    data: ZoteroGroupData,
}

#[derive(Debug, Deserialize)]
struct ZoteroGroupData {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ZoteroCollectionEntry {
    key: String,
    data: ZoteroCollectionData,
}

#[derive(Debug, Deserialize)]
struct ZoteroCollectionData {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ZoteroDocumentEntry {
    id: String,
    title: Option<String>,
    #[serde(flatten)]
    csl: serde_json::Value,
}

#[async_trait]
impl CitationAddon for ZoteroCitation {
    async fn get_external_account_id(&self) -> Result<String, ProviderError> {
        if let Some(id) = &self.config.external_account_id {
            return Ok(id.clone());
        }
        let response = self.requestor.get("keys", &[]).await?;
        if !response.is_success() {
            return Err(ProviderError::MalformedResponse(format!("zotero /keys returned {}", response.status)));
        }
        let body: serde_json::Value = response.json().map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        body.get("userID")
            .and_then(|v| v.as_u64().map(|n| n.to_string()).or_else(|| v.as_str().map(str::to_string)))
            .ok_or_else(|| ProviderError::MalformedResponse("zotero /keys response had no userID".to_string()))
    }

    async fn list_root_collections(&self) -> Result<ItemSampleResult<Item>, ProviderError> {
        let account_id = self.external_account_id()?;
        let response = self.requestor.get(&format!("users/{account_id}/groups"), &[]).await?;
        let groups: Vec<ZoteroGroup> =
            response.json().map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let mut items: Vec<Item> = groups
            .into_iter()
            .map(|group| {
                Item::new(
                    format!("{}:", group.id),
                    group.data.name.unwrap_or_else(|| "Unnamed Library".to_string()),
                    ItemType::Collection,
                )
            })
            .collect();
        items.push(Item::new("personal:", "My Library", ItemType::Collection));

        let cursor = Cursor::Marker { opaque_marker: String::new() }.serialize();
        Ok(ItemSampleResult {
            total_count: Some(items.len() as u64),
            items,
            this_sample_cursor: cursor.clone(),
            next_sample_cursor: None,
            prev_sample_cursor: None,
            first_sample_cursor: cursor,
        })
    }

    async fn list_collection_items(&self, collection_id: &str) -> Result<ItemSampleResult<Item>, ProviderError> {
        let (library, collection) = collection_id
            .split_once(':')
            .ok_or_else(|| ProviderError::InvalidItemId(collection_id.to_string()))?;
        let collection = if collection.is_empty() { "ROOT" } else { collection };
        let prefix = self.resolve_collection_prefix(library, collection)?;

        let documents_response = self.requestor.get(&format!("{prefix}/items/top"), &[("format", "csljson")]).await?;
        let documents: serde_json::Value =
            documents_response.json().map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        let documents = documents
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let mut items: Vec<Item> = documents
            .into_iter()
            .filter_map(|raw| serde_json::from_value::<ZoteroDocumentEntry>(raw).ok())
            .map(|doc| {
                let mut item = Item::new(
                    format!("{library}:{}", doc.id),
                    doc.title.unwrap_or_else(|| "Unnamed title".to_string()),
                    ItemType::Document,
                );
                item.csl = Some(doc.csl);
                item
            })
            .collect();

        let subcollections_response = self.requestor.get(&format!("{prefix}/collections/top"), &[]).await?;
        let subcollections: Vec<ZoteroCollectionEntry> =
            subcollections_response.json().map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        items.extend(subcollections.into_iter().map(|entry| {
            Item::new(format!("{library}:{}", entry.key), entry.data.name.unwrap_or_else(|| "Unnamed title".to_string()), ItemType::Collection)
        }));

        let total_count = items.len() as u64;
        let cursor = Cursor::Marker { opaque_marker: String::new() }.serialize();
        Ok(ItemSampleResult {
            items,
            total_count: Some(total_count),
            this_sample_cursor: cursor.clone(),
            next_sample_cursor: None,
            prev_sample_cursor: None,
            first_sample_cursor: cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_provider(server: &MockServer, external_account_id: Option<&str>) -> ZoteroCitation {
        use gravy_crypto::Credentials;
        use gravy_http::CredentialsProvider;
        use reqwest::Url;

        struct StaticCreds;
        #[async_trait]
        impl CredentialsProvider for StaticCreds {
            async fn current(&self) -> Result<Credentials, gravy_http::HttpError> {
                Ok(Credentials::AccessToken { token: "ZOTERO_KEY".to_string() })
            }
            async fn refresh_oauth2(&self) -> Result<Credentials, gravy_http::HttpError> {
                unreachable!()
            }
        }

        let requestor = Arc::new(Requestor::new(
            Url::parse(&format!("{}/", server.uri())).unwrap(),
            Arc::new(StaticCreds),
            Duration::from_secs(5),
        ));
        let config = ProviderConfig { external_account_id: external_account_id.map(str::to_string), ..Default::default() };
        ZoteroCitation::new(requestor, config)
    }

    #[tokio::test]
    async fn test_list_root_collections_appends_personal_library() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/999/groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 111, "data": {"name": "Lab Group"}},
            ])))
            .mount(&server)
            .await;

        let provider = test_provider(&server, Some("999")).await;
        let result = provider.list_root_collections().await.unwrap();

        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0].item_id, "111:");
        assert_eq!(result.items[1].item_id, "personal:");
        assert_eq!(result.items[1].item_name, "My Library");
    }

    #[tokio::test]
    async fn test_get_external_account_id_prefers_cached_config() {
        let server = MockServer::start().await;
        let provider = test_provider(&server, Some("42")).await;
        assert_eq!(provider.get_external_account_id().await.unwrap(), "42");
    }
}
