//! LLM provider abstractions and implementations.
//!
//! This module provides a trait-based abstraction for chat-completion
//! providers, allowing the workflow to swap between Gemini and a scripted
//! mock without changing the router or answerers.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use service_core::retry::Retryable;
use thiserror::Error;

use crate::models::Turn;

/// Error type for provider operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Empty response from provider")]
    EmptyResponse,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),
}

impl ProviderError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::ServerError(_) => "server_error",
            ProviderError::InvalidRequest(_) => "invalid_request",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::ContentFiltered => "content_filtered",
            ProviderError::EmptyResponse => "empty_response",
            ProviderError::NetworkError(_) => "network_error",
            ProviderError::Timeout(_) => "timeout",
        }
    }
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::ServerError(_)
                | ProviderError::RateLimited
                | ProviderError::NetworkError(_)
                | ProviderError::Timeout(_)
        )
    }
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
}

/// Result of a provider call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,

    /// Input tokens consumed.
    pub input_tokens: i32,

    /// Output tokens generated.
    pub output_tokens: i32,

    pub finish_reason: FinishReason,
}

/// Generation parameters for LLM requests.
#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    /// Temperature (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Maximum output tokens.
    pub max_tokens: Option<i32>,

    /// Ask the provider to emit a JSON document.
    pub json_mode: bool,
}

/// A single chat-completion request.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// System instruction.
    pub system: Option<String>,

    /// Conversation turns, oldest first. The final turn is the one to answer.
    pub messages: Vec<Turn>,

    pub params: GenerationParams,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, messages: Vec<Turn>) -> Self {
        Self {
            system: Some(system.into()),
            messages,
            params: GenerationParams::default(),
        }
    }

    pub fn json_mode(mut self) -> Self {
        self.params.json_mode = true;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.params.temperature = Some(temperature);
        self
    }

    /// Content of the last user turn, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|t| t.role == crate::models::Role::User)
            .map(|t| t.content.as_str())
    }
}

/// Trait for chat-completion providers (e.g., Gemini).
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Provider label for logs and metrics.
    fn name(&self) -> &'static str;

    /// Model identifier.
    fn model(&self) -> &str;

    /// Generate a completion.
    async fn generate(&self, request: &CompletionRequest) -> Result<ProviderResponse, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
