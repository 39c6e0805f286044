//! Storage on box.com (`addon_imps/storage/box_dot_com.py`). Box paginates
//! folder listings with a marker, not an offset, so this provider's pages
//! always come back as `Cursor::Marker`.

use async_trait::async_trait;
use gravy_http::Requestor;
use gravy_pagination::{Cursor, ItemSampleResult};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::interfaces::{Item, ItemType, ProviderError, StorageAddon};

const ROOT_FOLDER_ID: &str = "0";

pub struct BoxDotComStorage {
    requestor: Arc<Requestor>,
    #[allow(dead_code)]
    config: ProviderConfig,
}

impl BoxDotComStorage {
    pub fn new(requestor: Arc<Requestor>, config: ProviderConfig) -> Self {
        Self { requestor, config }
    }
}

#[derive(Debug, Deserialize)]
struct BoxItem {
    id: String,
    name: String,
    #[serde(rename = "type")]
    box_type: String,
}

#[derive(Debug, Deserialize)]
struct BoxFolderItems {
    entries: Vec<BoxItem>,
    next_marker: Option<String>,
}

fn folder_items_url(folder_id: &str) -> String {
    format!("folders/{folder_id}/items")
}

fn file_url(file_id: &str) -> String {
    format!("files/{file_id}")
}

fn folder_url(folder_id: &str) -> String {
    format!("folders/{folder_id}")
}

fn parse_box_item(item: BoxItem) -> Item {
    let item_type = if item.box_type == "folder" { ItemType::Folder } else { ItemType::File };
    Item::new(item.id, item.name, item_type)
}

#[async_trait]
impl StorageAddon for BoxDotComStorage {
    async fn get_root_items(&self, page_cursor: &str) -> Result<ItemSampleResult<Item>, ProviderError> {
        self.list_child_items(ROOT_FOLDER_ID, page_cursor).await
    }

    async fn list_child_items(&self, item_id: &str, page_cursor: &str) -> Result<ItemSampleResult<Item>, ProviderError> {
        // https://developer.box.com/guides/api-calls/pagination/marker-based/
        let mut query = vec![("usemarker", "true")];
        if !page_cursor.is_empty() {
            query.push(("marker", page_cursor));
        }

        let response = self.requestor.get(&folder_items_url(item_id), &query).await?;
        let body: BoxFolderItems = response.json().map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let this_cursor = Cursor::Marker { opaque_marker: page_cursor.to_string() }.serialize();
        let next_cursor = body.next_marker.map(|marker| Cursor::Marker { opaque_marker: marker }.serialize());

        Ok(ItemSampleResult {
            items: body.entries.into_iter().map(parse_box_item).collect(),
            total_count: None,
            this_sample_cursor: this_cursor,
            next_sample_cursor: next_cursor,
            prev_sample_cursor: None,
            first_sample_cursor: Cursor::Marker { opaque_marker: String::new() }.serialize(),
        })
    }

    async fn delete_item(&self, item_id: &str) -> Result<(), ProviderError> {
        // Box has no unified delete-by-id endpoint and item ids carry no
        // file/folder tag, so a file delete is tried first and a folder
        // delete only on a 404 (https://developer.box.com/reference/delete-files-id/,
        // .../delete-folders-id/).
        let response = self.requestor.delete(&file_url(item_id)).await?;
        if response.is_success() {
            return Ok(());
        }
        if response.status != 404 {
            return Err(ProviderError::MalformedResponse(format!("box delete returned {}", response.status)));
        }

        let response = self.requestor.delete(&folder_url(item_id)).await?;
        if response.is_success() {
            return Ok(());
        }
        if response.status == 404 {
            return Err(ProviderError::NotFound(item_id.to_string()));
        }
        Err(ProviderError::MalformedResponse(format!("box delete returned {}", response.status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_requestor(server: &MockServer) -> Arc<Requestor> {
        use gravy_crypto::Credentials;
        use gravy_http::CredentialsProvider;
        use reqwest::Url;

        struct StaticCreds;
        #[async_trait]
        impl CredentialsProvider for StaticCreds {
            async fn current(&self) -> Result<Credentials, gravy_http::HttpError> {
                Ok(Credentials::AccessToken { token: "BOX_TOKEN".to_string() })
            }
            async fn refresh_oauth2(&self) -> Result<Credentials, gravy_http::HttpError> {
                unreachable!()
            }
        }

        Arc::new(Requestor::new(
            Url::parse(&format!("{}/v2/", server.uri())).unwrap(),
            Arc::new(StaticCreds),
            Duration::from_secs(5),
        ))
    }

    #[tokio::test]
    async fn test_get_root_items_parses_box_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/folders/0/items"))
            .and(query_param("usemarker", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "entries": [
                    {"id": "123", "name": "Documents", "type": "folder"},
                    {"id": "456", "name": "report.pdf", "type": "file"},
                ],
                "next_marker": null,
            })))
            .mount(&server)
            .await;

        let provider = BoxDotComStorage::new(test_requestor(&server).await, ProviderConfig::default());
        let result = provider.get_root_items("").await.unwrap();

        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0].item_type, ItemType::Folder);
        assert_eq!(result.items[1].item_type, ItemType::File);
        assert!(result.is_last_page());
    }

    #[tokio::test]
    async fn test_list_child_items_forwards_marker_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/folders/999/items"))
            .and(query_param("marker", "page2token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "entries": [],
                "next_marker": "page3token",
            })))
            .mount(&server)
            .await;

        let provider = BoxDotComStorage::new(test_requestor(&server).await, ProviderConfig::default());
        let result = provider.list_child_items("999", "page2token").await.unwrap();

        assert_eq!(result.next_sample_cursor, Some("page3token".to_string()));
    }

    #[tokio::test]
    async fn test_delete_item_deletes_a_file_without_trying_the_folder_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE")).and(path("/v2/files/123")).respond_with(ResponseTemplate::new(204)).mount(&server).await;

        let provider = BoxDotComStorage::new(test_requestor(&server).await, ProviderConfig::default());
        provider.delete_item("123").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_item_falls_back_to_the_folder_endpoint_on_404() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE")).and(path("/v2/files/456")).respond_with(ResponseTemplate::new(404)).mount(&server).await;
        Mock::given(method("DELETE")).and(path("/v2/folders/456")).respond_with(ResponseTemplate::new(204)).mount(&server).await;

        let provider = BoxDotComStorage::new(test_requestor(&server).await, ProviderConfig::default());
        provider.delete_item("456").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_item_returns_not_found_when_neither_endpoint_has_it() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE")).and(path("/v2/files/789")).respond_with(ResponseTemplate::new(404)).mount(&server).await;
        Mock::given(method("DELETE")).and(path("/v2/folders/789")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let provider = BoxDotComStorage::new(test_requestor(&server).await, ProviderConfig::default());
        let err = provider.delete_item("789").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
