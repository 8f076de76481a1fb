//! Answers a question from the content of one fetched page.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::parse::parse_context_answer;
use super::prompts::{retrieval_prompt, RETRIEVAL_SYSTEM_PROMPT};
use crate::error::KbError;
use crate::models::{SourceDocument, Turn};
use crate::services::fetcher::{ContentFetcher, FetchError, RetrievedDocument};
use crate::services::llm::LlmClient;
use crate::services::metrics;
use crate::services::providers::CompletionRequest;

/// Result of a retrieval attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalOutcome {
    Answered {
        answer: String,
        source: SourceDocument,
    },
    /// The page could not be fetched.
    FetchFailed(FetchError),
    /// The model's grounded reply could not be parsed.
    Unreadable,
}

pub struct RetrievalAnswerer {
    llm: LlmClient,
    fetcher: Arc<dyn ContentFetcher>,
    fetch_timeout: Duration,
    temperature: f32,
}

impl RetrievalAnswerer {
    pub fn new(
        llm: LlmClient,
        fetcher: Arc<dyn ContentFetcher>,
        fetch_timeout: Duration,
        temperature: f32,
    ) -> Self {
        Self {
            llm,
            fetcher,
            fetch_timeout,
            temperature,
        }
    }

    async fn fetch(&self, url: &str) -> Result<RetrievedDocument, FetchError> {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url)).await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.fetch_timeout.as_secs())),
        };
        metrics::record_fetch(self.fetcher.name(), start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            metrics::record_fetch_error(e.kind());
        }
        result
    }

    /// Fetch `url` and answer `question` strictly from its content.
    ///
    /// Fetch and parse failures are outcomes, not errors; a failed LLM call
    /// is an error.
    pub async fn answer(
        &self,
        history: &[Turn],
        question: &str,
        url: &str,
    ) -> Result<RetrievalOutcome, KbError> {
        let document = match self.fetch(url).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Content fetch failed");
                return Ok(RetrievalOutcome::FetchFailed(e));
            }
        };
        tracing::info!(
            url = %url,
            title = document.title.as_deref().unwrap_or_default(),
            chars = document.content.len(),
            "Fetched source content"
        );

        let mut messages = history.to_vec();
        messages.push(Turn::user(retrieval_prompt(
            question,
            &document.source_url,
            &document.content,
        )));
        let request = CompletionRequest::new(RETRIEVAL_SYSTEM_PROMPT, messages)
            .json_mode()
            .temperature(self.temperature);

        let raw = self.llm.complete("retrieval_answer", &request).await?;

        match parse_context_answer(&raw) {
            Ok(answer) => Ok(RetrievalOutcome::Answered {
                answer,
                source: SourceDocument {
                    page_content: document.content,
                    metadata: document.source_url,
                },
            }),
            Err(e) => {
                tracing::warn!(error = %e, raw = %raw, "Grounded answer unparseable");
                metrics::record_decision_parse_failure("retrieval");
                Ok(RetrievalOutcome::Unreadable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fetcher::MockContentFetcher;
    use crate::services::providers::mock::MockTextProvider;
    use service_core::retry::RetryConfig;

    const URL: &str = "https://help.example.com/fees";

    fn answerer(provider: Arc<MockTextProvider>, fetcher: MockContentFetcher) -> RetrievalAnswerer {
        RetrievalAnswerer::new(
            LlmClient::new(provider, Duration::from_secs(1), RetryConfig::no_retry()),
            Arc::new(fetcher),
            Duration::from_secs(1),
            0.0,
        )
    }

    #[tokio::test]
    async fn grounded_answer_carries_source() {
        let provider = Arc::new(MockTextProvider::with_responses([format!(
            r#"```json
{{"routerDecision":"WEB_SEARCH","message":"{}","contextAnswer":"Debit costs 1.37%."}}
```"#,
            URL
        )]));
        let fetcher = MockContentFetcher::new().with_page(URL, "Debit: 1.37%");

        let outcome = answerer(provider.clone(), fetcher)
            .answer(&[], "What are the fees?", URL)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RetrievalOutcome::Answered {
                answer: "Debit costs 1.37%.".to_string(),
                source: SourceDocument {
                    page_content: "Debit: 1.37%".to_string(),
                    metadata: URL.to_string(),
                },
            }
        );
        let prompt = provider.requests()[0].last_user_message().unwrap().to_string();
        assert!(prompt.contains("Debit: 1.37%"));
        assert!(prompt.contains(URL));
    }

    #[tokio::test]
    async fn fetch_failure_skips_the_llm() {
        let provider = Arc::new(MockTextProvider::new(true));
        let fetcher = MockContentFetcher::new().with_error(URL, FetchError::Status(500));

        let outcome = answerer(provider.clone(), fetcher)
            .answer(&[], "q", URL)
            .await
            .unwrap();

        assert_eq!(outcome, RetrievalOutcome::FetchFailed(FetchError::Status(500)));
        assert!(provider.requests().is_empty());
    }

    /// Fetcher that never answers within the configured bound.
    struct StalledFetcher;

    #[async_trait::async_trait]
    impl ContentFetcher for StalledFetcher {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn fetch(&self, url: &str) -> Result<RetrievedDocument, FetchError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(RetrievedDocument {
                source_url: url.to_string(),
                content: "too late".to_string(),
                title: None,
            })
        }
    }

    #[tokio::test]
    async fn slow_fetch_times_out_without_calling_the_llm() {
        let provider = Arc::new(MockTextProvider::new(true));
        let answerer = RetrievalAnswerer::new(
            LlmClient::new(provider.clone(), Duration::from_secs(1), RetryConfig::no_retry()),
            Arc::new(StalledFetcher),
            Duration::from_millis(20),
            0.0,
        );

        let outcome = answerer.answer(&[], "q", URL).await.unwrap();

        assert!(matches!(
            outcome,
            RetrievalOutcome::FetchFailed(FetchError::Timeout(_))
        ));
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn malformed_reply_is_unreadable() {
        let provider = Arc::new(MockTextProvider::with_responses(["{\"contextAnswer\": "]));
        let fetcher = MockContentFetcher::new().with_page(URL, "content");

        let outcome = answerer(provider, fetcher).answer(&[], "q", URL).await.unwrap();
        assert_eq!(outcome, RetrievalOutcome::Unreadable);
    }
}
