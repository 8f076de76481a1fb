//! Bounded, retried access to the configured text provider.

use service_core::retry::{retry_with_backoff, RetryConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::metrics;
use super::providers::{CompletionRequest, ProviderError, TextProvider};

/// Every completion gets a per-attempt timeout, and transient failures are
/// retried with backoff.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn TextProvider>,
    timeout: Duration,
    retry: RetryConfig,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn TextProvider>, timeout: Duration, retry: RetryConfig) -> Self {
        Self {
            provider,
            timeout,
            retry,
        }
    }

    pub fn provider(&self) -> &Arc<dyn TextProvider> {
        &self.provider
    }

    /// Completion text for `request`. `operation` labels logs.
    pub async fn complete(
        &self,
        operation: &str,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError> {
        retry_with_backoff(&self.retry, operation, || self.attempt(request)).await
    }

    async fn attempt(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let provider = self.provider.name();
        let model = self.provider.model().to_string();
        let start = Instant::now();

        let result = match tokio::time::timeout(self.timeout, self.provider.generate(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout.as_secs())),
        };

        metrics::record_llm_latency(provider, &model, start.elapsed().as_secs_f64());

        match result {
            Ok(response) => {
                metrics::record_tokens(
                    provider,
                    &model,
                    response.input_tokens,
                    response.output_tokens,
                );
                tracing::debug!(
                    provider,
                    model = %model,
                    input_tokens = response.input_tokens,
                    output_tokens = response.output_tokens,
                    "Completion received"
                );
                Ok(response.text)
            }
            Err(e) => {
                metrics::record_llm_error(provider, e.kind());
                Err(e)
            }
        }
    }
}
