use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

use crate::error::KbError;
use crate::models::{ChatReply, SourceDocument, WorkflowStep};
use crate::startup::AppState;

pub const MISSING_CHAT_FIELDS: &str =
    "Missing required fields: message, user_id, or conversation_id";

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Absent fields deserialize as empty and are rejected by validation.
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub message: String,

    #[serde(default)]
    #[validate(length(min = 1))]
    pub user_id: String,

    #[serde(default)]
    #[validate(length(min = 1))]
    pub conversation_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub source_agent_response: String,
    pub agent_workflow: Vec<WorkflowStep>,
    #[serde(rename = "sourceDocuments")]
    pub source_documents: Vec<SourceDocument>,
}

impl From<ChatReply> for ChatResponse {
    fn from(reply: ChatReply) -> Self {
        Self {
            source_agent_response: reply.answer_text.clone(),
            response: reply.answer_text,
            agent_workflow: reply.workflow_steps,
            source_documents: reply.source_documents,
        }
    }
}

/// Unreadable bodies are reported as 400 like missing fields.
pub(crate) fn bad_body(rejection: JsonRejection) -> AppError {
    tracing::debug!(error = %rejection, "Rejected request body");
    AppError::BadRequest(anyhow::anyhow!("Invalid request body: {}", rejection.body_text()))
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = payload.map_err(bad_body)?;
    req.validate()
        .map_err(|_| KbError::Validation(MISSING_CHAT_FIELDS.to_string()))?;

    let reply = state
        .chat
        .chat(&req.user_id, &req.conversation_id, &req.message)
        .await?;

    Ok(Json(reply.into()))
}
