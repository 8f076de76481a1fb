//! General-knowledge answers.

use super::prompts::DIRECT_SYSTEM_PROMPT;
use crate::error::KbError;
use crate::models::Turn;
use crate::services::llm::LlmClient;
use crate::services::providers::CompletionRequest;

pub struct DirectAnswerer {
    llm: LlmClient,
    temperature: f32,
}

impl DirectAnswerer {
    pub fn new(llm: LlmClient, temperature: f32) -> Self {
        Self { llm, temperature }
    }

    pub async fn answer(&self, history: &[Turn], question: &str) -> Result<String, KbError> {
        let mut messages = history.to_vec();
        messages.push(Turn::user(question));
        let request =
            CompletionRequest::new(DIRECT_SYSTEM_PROMPT, messages).temperature(self.temperature);

        Ok(self.llm.complete("direct_answer", &request).await?)
    }
}
