#![allow(dead_code)]

use kb_service::config::{
    FirecrawlSettings, KbConfig, LlmConfig, LlmProviderKind, SessionBackend, SessionConfig,
};
use kb_service::services::fetcher::MockContentFetcher;
use kb_service::services::metrics::init_metrics;
use kb_service::services::providers::mock::MockTextProvider;
use kb_service::services::session_store::{InMemorySessionStore, SessionStore};
use kb_service::services::sitemap::SitemapLoader;
use kb_service::startup::{AppState, Application};
use serde_json::{json, Value};
use service_core::config::Config as CoreConfig;
use std::sync::Arc;

pub const FEES_URL: &str =
    "https://ajuda.infinitepay.io/pt-BR/articles/3359956-quais-sao-as-taxas-da-infinitepay";
pub const PIX_URL: &str =
    "https://ajuda.infinitepay.io/pt-BR/articles/3406925-como-funciona-o-pix-na-infinitepay";

pub const FEES_PAGE: &str = "# Quais são as taxas da InfinitePay?\n\n\
Débito: 1,37%\nCrédito à vista: 3,15%\nPix: 0%";

pub fn test_config() -> KbConfig {
    KbConfig {
        common: CoreConfig {
            port: 0, // Random port for testing
            ..CoreConfig::default()
        },
        llm: LlmConfig {
            provider: LlmProviderKind::Mock,
            api_key: String::new(),
            model: "mock-model".to_string(),
            temperature: 0.0,
            max_retries: 0,
        },
        firecrawl: FirecrawlSettings {
            api_key: String::new(),
            base_url: "http://127.0.0.1:9".to_string(),
        },
        session: SessionConfig {
            backend: SessionBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "kb:test".to_string(),
            ttl_seconds: 60,
        },
        sitemap_path: "data/sitemap.xml".to_string(),
        external_call_timeout_seconds: 5,
        cors_allowed_origins: vec!["*".to_string()],
    }
}

/// Router reply choosing a web search.
pub fn web_search(url: &str) -> String {
    json!({ "routerDecision": "WEB_SEARCH", "message": url }).to_string()
}

/// Router reply choosing a direct answer.
pub fn answer_directly(message: &str) -> String {
    json!({ "routerDecision": "ANSWER_DIRECTLY", "message": message }).to_string()
}

/// Grounded reply from the retrieval prompt, wrapped the way models often do.
pub fn grounded(url: &str, answer: &str) -> String {
    format!(
        "```json\n{}\n```",
        json!({ "routerDecision": "WEB_SEARCH", "message": url, "contextAnswer": answer })
    )
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub provider: Arc<MockTextProvider>,
    pub fetcher: Arc<MockContentFetcher>,
    pub client: reqwest::Client,
}

impl TestApp {
    /// App with an empty script, the fees page available, and an in-memory store.
    pub async fn spawn() -> Self {
        Self::spawn_with(
            MockTextProvider::new(true),
            MockContentFetcher::new().with_page(FEES_URL, FEES_PAGE),
            Arc::new(InMemorySessionStore::new()),
        )
        .await
    }

    pub async fn spawn_with(
        provider: MockTextProvider,
        fetcher: MockContentFetcher,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        init_metrics();

        let provider = Arc::new(provider);
        let fetcher = Arc::new(fetcher);
        let state = AppState::new(
            test_config(),
            provider.clone(),
            fetcher.clone(),
            store,
            SitemapLoader::from_urls(vec![FEES_URL.to_string(), PIX_URL.to_string()]),
        );

        let app = Application::build_with_state(state)
            .await
            .expect("Failed to build test application");
        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to accept connections
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client.get(format!("{}/health", address)).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            provider,
            fetcher,
            client,
        }
    }

    pub async fn post_chat(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}/api/kb/chat", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Send `message` for the given conversation and return status and JSON body.
    pub async fn chat(&self, user_id: &str, conversation_id: &str, message: &str) -> (u16, Value) {
        let response = self
            .post_chat(&json!({
                "message": message,
                "user_id": user_id,
                "conversation_id": conversation_id,
            }))
            .await;
        let status = response.status().as_u16();
        let body = response.json().await.expect("Failed to parse JSON");
        (status, body)
    }

    pub async fn clear(&self, user_id: &str, conversation_id: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/api/kb/clear", self.address))
            .json(&json!({ "user_id": user_id, "conversation_id": conversation_id }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn history(&self, user_id: &str, conversation_id: &str) -> Value {
        self.client
            .get(format!(
                "{}/api/kb/history/{}/{}",
                self.address, user_id, conversation_id
            ))
            .send()
            .await
            .expect("Failed to execute request")
            .json()
            .await
            .expect("Failed to parse JSON")
    }
}
