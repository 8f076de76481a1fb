//! Session-scoped chat exchanges.

use std::sync::Arc;

use super::locks::KeyedLocks;
use super::session_store::SessionStore;
use crate::error::KbError;
use crate::models::{ChatReply, Transcript, Turn};
use crate::workflow::Workflow;

/// Session identifier for a user's conversation.
pub fn session_id(user_id: &str, conversation_id: &str) -> String {
    format!("{}-{}", user_id, conversation_id)
}

/// Runs one exchange at a time per session; distinct sessions run concurrently.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn SessionStore>,
    workflow: Arc<Workflow>,
    locks: KeyedLocks,
}

impl ChatService {
    pub fn new(store: Arc<dyn SessionStore>, workflow: Arc<Workflow>) -> Self {
        Self {
            store,
            workflow,
            locks: KeyedLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Answer `message` and record the exchange in the session transcript.
    #[tracing::instrument(skip(self, message), fields(session_id = tracing::field::Empty))]
    pub async fn chat(
        &self,
        user_id: &str,
        conversation_id: &str,
        message: &str,
    ) -> Result<ChatReply, KbError> {
        let session_id = session_id(user_id, conversation_id);
        tracing::Span::current().record("session_id", session_id.as_str());

        let _guard = self.locks.lock(&session_id).await;

        let transcript = self.store.get(&session_id).await?;
        tracing::debug!(turns = transcript.len(), "Loaded transcript");

        let reply = self.workflow.run(&transcript, message).await?;

        self.store
            .append(
                &session_id,
                vec![Turn::user(message), Turn::assistant(reply.answer_text.clone())],
            )
            .await?;

        tracing::info!(
            steps = reply.workflow_steps.len(),
            sources = reply.source_documents.len(),
            "Exchange complete"
        );
        Ok(reply)
    }

    /// Reset a session to its seeded transcript.
    pub async fn clear(&self, session_id: &str) -> Result<(), KbError> {
        let _guard = self.locks.lock(session_id).await;
        self.store.clear(session_id).await?;
        tracing::info!(session_id = %session_id, "Session cleared");
        Ok(())
    }

    pub async fn history(&self, session_id: &str) -> Result<Transcript, KbError> {
        Ok(self.store.get(session_id).await?)
    }
}
