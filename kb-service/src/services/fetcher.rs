//! Page content retrieval.
//!
//! The retrieval answerer grounds its answer on the markdown of a single
//! page. [`FirecrawlFetcher`] renders pages through the Firecrawl scrape
//! API; [`MockContentFetcher`] serves canned pages for tests.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Firecrawl API base URL.
pub const FIRECRAWL_API_BASE: &str = "https://api.firecrawl.dev";

/// Fetched page content, consumed by a single answer and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedDocument {
    pub source_url: String,
    pub content: String,
    pub title: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Fetcher not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Scrape API returned status {0}")]
    Status(u16),

    #[error("Failed to decode scrape response: {0}")]
    Decode(String),

    #[error("No content returned for {0}")]
    EmptyContent(String),

    #[error("Fetch timed out after {0}s")]
    Timeout(u64),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::NotConfigured(_) => "not_configured",
            FetchError::Network(_) => "network",
            FetchError::Status(_) => "status",
            FetchError::Decode(_) => "decode",
            FetchError::EmptyContent(_) => "empty_content",
            FetchError::Timeout(_) => "timeout",
        }
    }
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Label for logs and metrics.
    fn name(&self) -> &'static str;

    async fn fetch(&self, url: &str) -> Result<RetrievedDocument, FetchError>;
}

// ============================================================================
// Firecrawl
// ============================================================================

#[derive(Debug, Clone)]
pub struct FirecrawlConfig {
    pub api_key: String,
    pub base_url: String,
}

impl FirecrawlConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: FIRECRAWL_API_BASE.to_string(),
        }
    }
}

/// Scrapes a page to markdown via `POST /v1/scrape`.
pub struct FirecrawlFetcher {
    config: FirecrawlConfig,
    client: Client,
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'static str; 1],
}

#[derive(Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    data: Option<ScrapeData>,
}

#[derive(Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
    metadata: Option<PageMetadata>,
}

#[derive(Deserialize)]
struct PageMetadata {
    title: Option<String>,
}

impl FirecrawlFetcher {
    pub fn new(config: FirecrawlConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ContentFetcher for FirecrawlFetcher {
    fn name(&self) -> &'static str {
        "firecrawl"
    }

    async fn fetch(&self, url: &str) -> Result<RetrievedDocument, FetchError> {
        if self.config.api_key.is_empty() {
            return Err(FetchError::NotConfigured(
                "Firecrawl API key not configured".to_string(),
            ));
        }

        let endpoint = format!("{}/v1/scrape", self.config.base_url.trim_end_matches('/'));
        tracing::debug!(url = %url, "Scraping page");

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&ScrapeRequest {
                url,
                formats: ["markdown"],
            })
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, url = %url, "Scrape request failed");
            return Err(FetchError::Status(status.as_u16()));
        }

        let scrape: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        let data = match scrape.data {
            Some(data) if scrape.success => data,
            _ => return Err(FetchError::EmptyContent(url.to_string())),
        };

        let content = data.markdown.unwrap_or_default();
        if content.trim().is_empty() {
            return Err(FetchError::EmptyContent(url.to_string()));
        }

        Ok(RetrievedDocument {
            source_url: url.to_string(),
            content,
            title: data.metadata.and_then(|m| m.title),
        })
    }
}

// ============================================================================
// Mock
// ============================================================================

/// Serves canned pages keyed by URL. Unknown URLs fail with `Status(404)`.
#[derive(Default)]
pub struct MockContentFetcher {
    pages: Mutex<HashMap<String, Result<String, FetchError>>>,
    calls: Mutex<Vec<String>>,
}

impl MockContentFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, content: impl Into<String>) -> Self {
        if let Ok(mut pages) = self.pages.lock() {
            pages.insert(url.into(), Ok(content.into()));
        }
        self
    }

    pub fn with_error(self, url: impl Into<String>, error: FetchError) -> Self {
        if let Ok(mut pages) = self.pages.lock() {
            pages.insert(url.into(), Err(error));
        }
        self
    }

    /// URLs fetched so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ContentFetcher for MockContentFetcher {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch(&self, url: &str) -> Result<RetrievedDocument, FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }

        let page = self
            .pages
            .lock()
            .map_err(|e| FetchError::Network(format!("Mock fetcher mutex poisoned: {}", e)))?
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::Status(404)))?;

        Ok(RetrievedDocument {
            source_url: url.to_string(),
            content: page,
            title: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = "https://ajuda.infinitepay.io/pt-BR/articles/3359956-quais-sao-as-taxas-da-infinitepay";

    fn fetcher(server: &MockServer) -> FirecrawlFetcher {
        FirecrawlFetcher::new(FirecrawlConfig {
            api_key: "fc-test".to_string(),
            base_url: server.uri(),
        })
    }

    #[tokio::test]
    async fn scrape_returns_markdown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .and(header("authorization", "Bearer fc-test"))
            .and(body_json(serde_json::json!({ "url": PAGE, "formats": ["markdown"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {
                    "markdown": "# Taxas\nDébito: 1,37%",
                    "metadata": { "title": "Quais são as taxas" }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let doc = fetcher(&server).fetch(PAGE).await.unwrap();
        assert_eq!(doc.source_url, PAGE);
        assert!(doc.content.contains("1,37%"));
        assert_eq!(doc.title.as_deref(), Some("Quais são as taxas"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = fetcher(&server).fetch(PAGE).await.unwrap_err();
        assert_eq!(err, FetchError::Status(502));
    }

    #[tokio::test]
    async fn empty_markdown_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": { "markdown": "   " }
            })))
            .mount(&server)
            .await;

        let err = fetcher(&server).fetch(PAGE).await.unwrap_err();
        assert!(matches!(err, FetchError::EmptyContent(_)));
    }

    #[tokio::test]
    async fn unsuccessful_scrape_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false
            })))
            .mount(&server)
            .await;

        assert!(fetcher(&server).fetch(PAGE).await.is_err());
    }

    #[tokio::test]
    async fn missing_api_key_is_not_configured() {
        let fetcher = FirecrawlFetcher::new(FirecrawlConfig::new(""));
        let err = fetcher.fetch(PAGE).await.unwrap_err();
        assert!(matches!(err, FetchError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn mock_serves_known_pages_only() {
        let fetcher = MockContentFetcher::new().with_page(PAGE, "fees");
        assert_eq!(fetcher.fetch(PAGE).await.unwrap().content, "fees");
        assert_eq!(
            fetcher.fetch("https://example.com").await.unwrap_err(),
            FetchError::Status(404)
        );
        assert_eq!(fetcher.calls().len(), 2);
    }
}
