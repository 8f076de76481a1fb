//! Mock provider implementation for tests and local runs.

use super::{CompletionRequest, FinishReason, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scripted text provider.
///
/// Queued responses are returned in order; once the queue is drained the
/// provider echoes the last user message. Every request is recorded.
pub struct MockTextProvider {
    enabled: bool,
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl Default for MockTextProvider {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MockTextProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider that replies with each of `responses` in turn.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new(true);
        for response in responses {
            provider.push_response(response);
        }
        provider
    }

    pub fn push_response(&self, response: impl Into<String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(response.into()));
        }
    }

    pub fn push_error(&self, error: ProviderError) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(error));
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn generate(&self, request: &CompletionRequest) -> Result<ProviderResponse, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            ));
        }

        self.requests
            .lock()
            .map_err(|e| ProviderError::ApiError(format!("Mock provider mutex poisoned: {}", e)))?
            .push(request.clone());

        let scripted = self
            .responses
            .lock()
            .map_err(|e| ProviderError::ApiError(format!("Mock provider mutex poisoned: {}", e)))?
            .pop_front();

        let text = match scripted {
            Some(result) => result?,
            None => format!(
                "Mock response for: {}",
                request.last_user_message().unwrap_or_default()
            ),
        };

        let input_tokens: usize = request.messages.iter().map(|t| t.content.len()).sum();

        Ok(ProviderResponse {
            output_tokens: text.len() as i32 / 4,
            text,
            input_tokens: input_tokens as i32 / 4,
            finish_reason: FinishReason::Complete,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.enabled {
            Ok(())
        } else {
            Err(ProviderError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            ))
        }
    }
}
