//! Decides whether a question needs web grounding.

use std::sync::Arc;

use super::parse::parse_router_decision;
use super::prompts::{router_system_prompt, ROUTER_FALLBACK_ANSWER};
use crate::error::KbError;
use crate::models::{RouterDecision, Turn};
use crate::services::llm::LlmClient;
use crate::services::metrics;
use crate::services::providers::CompletionRequest;
use crate::services::sitemap::SitemapLoader;

pub struct Router {
    llm: LlmClient,
    sitemap: Arc<SitemapLoader>,
    temperature: f32,
}

impl Router {
    pub fn new(llm: LlmClient, sitemap: Arc<SitemapLoader>, temperature: f32) -> Self {
        Self {
            llm,
            sitemap,
            temperature,
        }
    }

    /// Classify `question` given the prior conversation.
    ///
    /// Unparseable model output becomes the canned fallback decision; only a
    /// failed LLM call is an error.
    pub async fn decide(
        &self,
        history: &[Turn],
        question: &str,
    ) -> Result<RouterDecision, KbError> {
        let candidates = self.sitemap.load().await;

        let mut messages = history.to_vec();
        messages.push(Turn::user(question));
        let request = CompletionRequest::new(router_system_prompt(&candidates), messages)
            .json_mode()
            .temperature(self.temperature);

        let raw = self.llm.complete("router", &request).await?;
        tracing::debug!(raw = %raw, "Router output");

        let decision = match parse_router_decision(&raw) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(error = %e, raw = %raw, "Router output unparseable, falling back");
                metrics::record_decision_parse_failure("router");
                RouterDecision::fallback(ROUTER_FALLBACK_ANSWER)
            }
        };

        metrics::record_router_decision(decision.route.as_str());
        tracing::info!(
            route = decision.route.as_str(),
            fallback = decision.fallback,
            candidates = candidates.len(),
            "Router decided"
        );
        Ok(decision)
    }
}
