//! Web search
//!
//! The search page forwards queries to the Bing Web Search API. The HTTP
//! client sits behind [`SearchProvider`] so the rest of the app (and the
//! tests) never talk to the network directly.

use crate::config::SearchConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One hit on the results page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub summary: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search API key is not configured")]
    MissingApiKey,

    #[error("Search service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}

/// Bing Web Search v7 client
pub struct BingSearch {
    client: reqwest::Client,
    config: SearchConfig,
}

impl BingSearch {
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SearchProvider for BingSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(SearchError::MissingApiKey)?;

        let count = self.config.max_results.to_string();
        let response = self
            .client
            .get(&self.config.endpoint)
            .header("Ocp-Apim-Subscription-Key", api_key)
            .query(&[
                ("q", query),
                ("count", count.as_str()),
                ("textDecorations", "true"),
                ("textFormat", "HTML"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body: BingResponse = response.json().await?;
        Ok(body.into_results())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BingResponse {
    #[serde(default)]
    web_pages: Option<BingWebPages>,
}

#[derive(Debug, Default, Deserialize)]
struct BingWebPages {
    #[serde(default)]
    value: Vec<BingWebPage>,
}

#[derive(Debug, Deserialize)]
struct BingWebPage {
    name: String,
    url: String,
    #[serde(default)]
    snippet: String,
}

impl BingResponse {
    fn into_results(self) -> Vec<SearchResult> {
        self.web_pages
            .map(|pages| pages.value)
            .unwrap_or_default()
            .into_iter()
            .map(|page| SearchResult {
                title: page.name,
                link: page.url,
                summary: page.snippet,
            })
            .collect()
    }
}

pub struct SearchService {
    provider: Arc<dyn SearchProvider>,
}

impl SearchService {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    /// Run a query; a blank query returns no results without a request.
    pub async fn run_query(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        self.provider.search(query).await.map_err(|e| {
            tracing::warn!(error = %e, "Web search failed");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProvider {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SearchProvider for RecordingProvider {
        async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(vec![SearchResult {
                title: format!("About {}", query),
                link: "http://example.com".to_string(),
                summary: String::new(),
            }])
        }
    }

    #[tokio::test]
    async fn test_run_query_trims_and_skips_blank() {
        let provider = Arc::new(RecordingProvider::default());
        let service = SearchService::new(provider.clone());

        assert!(service.run_query("   ").await.unwrap().is_empty());
        let results = service.run_query("  rango  ").await.unwrap();

        assert_eq!(results[0].title, "About rango");
        assert_eq!(*provider.queries.lock().unwrap(), vec!["rango".to_string()]);
    }

    #[tokio::test]
    async fn test_bing_requires_api_key() {
        let bing = BingSearch::new(SearchConfig::default()).unwrap();
        assert!(matches!(
            bing.search("rust").await,
            Err(SearchError::MissingApiKey)
        ));
    }

    #[test]
    fn test_parse_bing_response() {
        let body = r#"{
            "_type": "SearchResponse",
            "webPages": {
                "totalEstimatedMatches": 2,
                "value": [
                    {"name": "Rust", "url": "https://www.rust-lang.org/", "snippet": "A <b>language</b>"},
                    {"name": "Crates", "url": "https://crates.io/"}
                ]
            }
        }"#;
        let parsed: BingResponse = serde_json::from_str(body).unwrap();
        let results = parsed.into_results();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].link, "https://www.rust-lang.org/");
        assert_eq!(results[0].summary, "A <b>language</b>");
        assert_eq!(results[1].summary, "");

        let empty: BingResponse = serde_json::from_str(r#"{"_type": "SearchResponse"}"#).unwrap();
        assert!(empty.into_results().is_empty());
    }
}
