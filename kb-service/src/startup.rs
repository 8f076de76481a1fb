//! Application startup and lifecycle management.

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::security_headers::security_headers_middleware;
use service_core::middleware::tracing::{make_request_span, request_id_middleware};
use service_core::retry::RetryConfig;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{KbConfig, LlmProviderKind, SessionBackend};
use crate::handlers;
use crate::middleware::metrics_middleware;
use crate::services::chat_service::ChatService;
use crate::services::fetcher::{ContentFetcher, FirecrawlConfig, FirecrawlFetcher};
use crate::services::llm::LlmClient;
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::mock::MockTextProvider;
use crate::services::providers::TextProvider;
use crate::services::session_store::{
    InMemorySessionStore, RedisSessionStore, RedisStoreConfig, SessionStore,
};
use crate::services::sitemap::SitemapLoader;
use crate::workflow::{DirectAnswerer, RetrievalAnswerer, Router as DecisionRouter, Workflow};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<KbConfig>,
    pub chat: ChatService,
    pub text_provider: Arc<dyn TextProvider>,
}

impl AppState {
    /// Wire the workflow from already-constructed collaborators.
    pub fn new(
        config: KbConfig,
        text_provider: Arc<dyn TextProvider>,
        fetcher: Arc<dyn ContentFetcher>,
        store: Arc<dyn SessionStore>,
        sitemap: SitemapLoader,
    ) -> Self {
        let timeout = config.external_call_timeout();
        let temperature = config.llm.temperature;
        let llm = LlmClient::new(
            text_provider.clone(),
            timeout,
            RetryConfig::with_max_retries(config.llm.max_retries),
        );

        let workflow = Workflow::new(
            DecisionRouter::new(llm.clone(), Arc::new(sitemap), temperature),
            RetrievalAnswerer::new(llm.clone(), fetcher, timeout, temperature),
            DirectAnswerer::new(llm, temperature),
        );

        Self {
            config: Arc::new(config),
            chat: ChatService::new(store, Arc::new(workflow)),
            text_provider,
        }
    }

    /// Build every collaborator from configuration.
    pub async fn from_config(config: KbConfig) -> Result<Self, AppError> {
        let text_provider: Arc<dyn TextProvider> = match config.llm.provider {
            LlmProviderKind::Gemini => Arc::new(GeminiTextProvider::new(GeminiConfig::new(
                config.llm.api_key.clone(),
                config.llm.model.clone(),
            ))),
            LlmProviderKind::Mock => {
                tracing::warn!("Using mock LLM provider");
                Arc::new(MockTextProvider::default())
            }
        };
        tracing::info!(
            provider = text_provider.name(),
            model = %text_provider.model(),
            "Initialized text provider"
        );

        if config.firecrawl.api_key.is_empty() {
            tracing::warn!("FIRECRAWL_API_KEY not set; web-search answers will fall back");
        }
        let fetcher: Arc<dyn ContentFetcher> = Arc::new(FirecrawlFetcher::new(FirecrawlConfig {
            api_key: config.firecrawl.api_key.clone(),
            base_url: config.firecrawl.base_url.clone(),
        }));

        let store: Arc<dyn SessionStore> = match config.session.backend {
            SessionBackend::Redis => Arc::new(
                RedisSessionStore::new(&RedisStoreConfig {
                    url: config.session.redis_url.clone(),
                    key_prefix: config.session.key_prefix.clone(),
                    ttl_seconds: config.session.ttl_seconds,
                    timeout: config.external_call_timeout(),
                })
                .await
                .map_err(AppError::InternalError)?,
            ),
            SessionBackend::Memory => {
                tracing::warn!("Using in-memory session store; transcripts are lost on restart");
                Arc::new(InMemorySessionStore::new())
            }
        };

        let sitemap = SitemapLoader::from_file(&config.sitemap_path, config.external_call_timeout());
        tracing::info!(path = %config.sitemap_path, "Sitemap configured");

        Ok(Self::new(config, text_provider, fetcher, store, sitemap))
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// HTTP routes with the shared middleware stack.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/kb/chat", post(handlers::chat::chat))
        .route("/api/kb/clear", post(handlers::session::clear))
        .route(
            "/api/kb/history/:user_id/:conversation_id",
            get(handlers::session::history),
        )
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::metrics_endpoint))
        // Route-level so the matched path template is available for labels
        .route_layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<axum::body::Body>))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.cors_allowed_origins))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: KbConfig) -> Result<Self, AppError> {
        let state = AppState::from_config(config).await?;
        Self::build_with_state(state).await
    }

    /// Bind a listener for prepared state (port 0 = random port for testing).
    pub async fn build_with_state(state: AppState) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], state.config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("kb-service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = build_router(self.state);
        axum::serve(self.listener, app).await
    }

    /// Serve until `signal` resolves, then drain in-flight requests.
    pub async fn run_with_shutdown<F>(self, signal: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = build_router(self.state);
        axum::serve(self.listener, app)
            .with_graceful_shutdown(signal)
            .await
    }
}
