//! Link resolution against Zenodo (`addon_imps/link/zenodo.py`). Zenodo has
//! no folder tree: a "deposition" is the only container, and its files are
//! the only children. Item ids are the two shapes `deposition/<id>` and
//! `file/<deposition_id>/<file_id>`, parsed by hand below rather than via a
//! regex crate since both shapes are a fixed prefix plus digit runs.

use async_trait::async_trait;
use gravy_http::Requestor;
use gravy_pagination::ItemSampleResult;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::interfaces::{Item, ItemType, LinkAddon, ProviderError};

const DEPOSITIONS_PATH: &str = "api/deposit/depositions";
const PAGE_SIZE: u32 = 10;

enum ParsedItemId {
    Root,
    Deposition(String),
    File { deposition_id: String, file_id: String },
}

fn parse_item_id(item_id: &str) -> Result<ParsedItemId, ProviderError> {
    if item_id.is_empty() {
        return Ok(ParsedItemId::Root);
    }
    if let Some(rest) = item_id.strip_prefix("deposition/") {
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
            return Ok(ParsedItemId::Deposition(rest.to_string()));
        }
    }
    if let Some(rest) = item_id.strip_prefix("file/") {
        if let Some((deposition_id, file_id)) = rest.split_once('/') {
            if !deposition_id.is_empty()
                && !file_id.is_empty()
                && deposition_id.chars().all(|c| c.is_ascii_digit())
                && file_id.chars().all(|c| c.is_ascii_digit())
            {
                return Ok(ParsedItemId::File {
                    deposition_id: deposition_id.to_string(),
                    file_id: file_id.to_string(),
                });
            }
        }
    }
    Err(ProviderError::InvalidItemId(item_id.to_string()))
}

pub struct ZenodoLink {
    requestor: Arc<Requestor>,
    config: ProviderConfig,
}

impl ZenodoLink {
    pub fn new(requestor: Arc<Requestor>, config: ProviderConfig) -> Self {
        Self { requestor, config }
    }

    fn external_web_url(&self) -> &str {
        self.config.external_web_url.as_deref().unwrap_or("https://zenodo.org")
    }

    async fn fetch_deposition(&self, deposition_id: &str) -> Result<Item, ProviderError> {
        let response = self.requestor.get(&format!("{DEPOSITIONS_PATH}/{deposition_id}"), &[]).await?;
        if response.status == 404 {
            return Err(ProviderError::NotFound(deposition_id.to_string()));
        }
        let raw: RawDeposition = response.json().map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        Ok(self.parse_deposition(raw))
    }

    fn parse_deposition(&self, raw: RawDeposition) -> Item {
        let title = raw.metadata.title.clone().unwrap_or_else(|| format!("Deposition {}", raw.id));
        let mut item = Item::new(format!("deposition/{}", raw.id), title, ItemType::Folder);
        item.doi = raw.metadata.doi.filter(|doi| !doi.is_empty());
        item.item_link = Some(format!("{}/record/{}", self.external_web_url(), raw.id));
        item
    }

    async fn fetch_record_files(&self, deposition_id: &str) -> Result<Vec<Item>, ProviderError> {
        let response = self.requestor.get(&format!("{DEPOSITIONS_PATH}/{deposition_id}/files"), &[]).await?;
        if response.status == 404 {
            return Ok(Vec::new());
        }
        let files: Vec<RawFile> = response.json().map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        Ok(files.into_iter().map(|file| self.parse_file(file, deposition_id)).collect())
    }

    fn parse_file(&self, file: RawFile, deposition_id: &str) -> Item {
        let mut item = Item::new(format!("file/{deposition_id}/{}", file.id), file.filename.clone(), ItemType::Resource);
        item.item_link = Some(format!("{}/record/{deposition_id}/files/{}", self.external_web_url(), file.filename));
        item
    }
}

#[derive(Debug, Deserialize)]
struct RawDeposition {
    id: u64,
    metadata: RawDepositionMetadata,
}

#[derive(Debug, Deserialize, Default)]
struct RawDepositionMetadata {
    title: Option<String>,
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    id: String,
    filename: String,
}

#[async_trait]
impl LinkAddon for ZenodoLink {
    async fn build_url_for_id(&self, item_id: &str) -> Result<String, ProviderError> {
        match parse_item_id(item_id)? {
            ParsedItemId::Root => Err(ProviderError::InvalidItemId(item_id.to_string())),
            ParsedItemId::Deposition(id) => Ok(format!("{}/deposition/{id}", self.external_web_url())),
            ParsedItemId::File { deposition_id, file_id } => {
                Ok(format!("{}/record/{deposition_id}/files/{file_id}", self.external_web_url()))
            }
        }
    }

    async fn get_external_account_id(&self) -> Result<String, ProviderError> {
        let response = self.requestor.get(DEPOSITIONS_PATH, &[]).await?;
        if !response.is_success() {
            return Err(ProviderError::MalformedResponse("could not get Zenodo account id, check your API token".to_string()));
        }
        let depositions: Vec<RawDeposition> =
            response.json().map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        Ok(depositions
            .first()
            .map(|d| d.id.to_string())
            .unwrap_or_else(|| "zenodo_user".to_string()))
    }

    async fn list_root_items(&self, page_cursor: &str) -> Result<ItemSampleResult<Item>, ProviderError> {
        let current_page: u32 = if page_cursor.is_empty() { 1 } else { page_cursor.parse().unwrap_or(1) };

        let response = self
            .requestor
            .get(DEPOSITIONS_PATH, &[("page", &current_page.to_string()), ("size", &PAGE_SIZE.to_string())])
            .await?;
        let raw: Vec<RawDeposition> = response.json().map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let returned_count = raw.len();
        let items: Vec<Item> = raw
            .into_iter()
            .map(|d| self.parse_deposition(d))
            .filter(|item| item.doi.is_some())
            .collect();

        let next_page = if returned_count == PAGE_SIZE as usize { Some(current_page + 1) } else { None };
        let prev_page = if current_page > 1 { Some(current_page - 1) } else { None };

        Ok(ItemSampleResult {
            total_count: Some(items.len() as u64),
            items,
            this_sample_cursor: current_page.to_string(),
            next_sample_cursor: next_page.map(|p| p.to_string()),
            prev_sample_cursor: prev_page.map(|p| p.to_string()),
            first_sample_cursor: "1".to_string(),
        })
    }

    async fn list_child_items(&self, item_id: &str, page_cursor: &str) -> Result<ItemSampleResult<Item>, ProviderError> {
        match parse_item_id(item_id)? {
            ParsedItemId::Root => self.list_root_items(page_cursor).await,
            ParsedItemId::Deposition(id) => {
                let files = self.fetch_record_files(&id).await?;
                let count = files.len() as u64;
                Ok(ItemSampleResult {
                    items: files,
                    total_count: Some(count),
                    this_sample_cursor: String::new(),
                    next_sample_cursor: None,
                    prev_sample_cursor: None,
                    first_sample_cursor: String::new(),
                })
            }
            ParsedItemId::File { .. } => Ok(ItemSampleResult {
                items: Vec::new(),
                total_count: Some(0),
                this_sample_cursor: String::new(),
                next_sample_cursor: None,
                prev_sample_cursor: None,
                first_sample_cursor: String::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_provider(server: &MockServer) -> ZenodoLink {
        use gravy_crypto::Credentials;
        use gravy_http::CredentialsProvider;
        use reqwest::Url;

        struct StaticCreds;
        #[async_trait]
        impl CredentialsProvider for StaticCreds {
            async fn current(&self) -> Result<Credentials, gravy_http::HttpError> {
                Ok(Credentials::AccessToken { token: "ZENODO_TOKEN".to_string() })
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
        ZenodoLink::new(requestor, ProviderConfig { external_web_url: Some("https://zenodo.org".to_string()), ..Default::default() })
    }

    #[test]
    fn test_parse_item_id_rejects_garbage() {
        assert!(matches!(parse_item_id("deposition/abc"), Err(ProviderError::InvalidItemId(_))));
        assert!(matches!(parse_item_id("something/1"), Err(ProviderError::InvalidItemId(_))));
    }

    #[test]
    fn test_parse_item_id_accepts_known_shapes() {
        assert!(matches!(parse_item_id(""), Ok(ParsedItemId::Root)));
        assert!(matches!(parse_item_id("deposition/42"), Ok(ParsedItemId::Deposition(id)) if id == "42"));
        assert!(matches!(
            parse_item_id("file/42/7"),
            Ok(ParsedItemId::File { deposition_id, file_id }) if deposition_id == "42" && file_id == "7"
        ));
    }

    #[tokio::test]
    async fn test_build_url_for_id_covers_both_shapes() {
        let server = MockServer::start().await;
        let provider = test_provider(&server).await;

        assert_eq!(provider.build_url_for_id("deposition/42").await.unwrap(), "https://zenodo.org/deposition/42");
        assert_eq!(
            provider.build_url_for_id("file/42/7").await.unwrap(),
            "https://zenodo.org/record/42/files/7"
        );
        assert!(provider.build_url_for_id("bogus").await.is_err());
    }

    #[tokio::test]
    async fn test_list_root_items_filters_unpublished_and_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/deposit/depositions"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "metadata": {"title": "Published", "doi": "10.1/abc"}},
                {"id": 2, "metadata": {"title": "Draft"}},
            ])))
            .mount(&server)
            .await;

        let provider = test_provider(&server).await;
        let result = provider.list_root_items("").await.unwrap();

        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].item_id, "deposition/1");
        assert!(result.next_sample_cursor.is_none());
    }
}
