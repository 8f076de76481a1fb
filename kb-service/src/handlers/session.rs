use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

use super::chat::bad_body;
use crate::error::KbError;
use crate::models::Turn;
use crate::services::chat_service::session_id;
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ClearRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub user_id: String,

    #[serde(default)]
    #[validate(length(min = 1))]
    pub conversation_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<Turn>,
}

/// Reset a conversation to its seeded transcript.
pub async fn clear(
    State(state): State<AppState>,
    payload: Result<Json<ClearRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(req) = payload.map_err(bad_body)?;
    req.validate().map_err(|_| {
        KbError::Validation("Missing required fields: user_id or conversation_id".to_string())
    })?;

    state
        .chat
        .clear(&session_id(&req.user_id, &req.conversation_id))
        .await?;

    Ok(Json(MessageResponse {
        message: "Thread cleared successfully".to_string(),
    }))
}

pub async fn history(
    State(state): State<AppState>,
    Path((user_id, conversation_id)): Path<(String, String)>,
) -> Result<Json<HistoryResponse>, AppError> {
    let session_id = session_id(&user_id, &conversation_id);
    let transcript = state.chat.history(&session_id).await?;

    Ok(Json(HistoryResponse {
        session_id,
        turns: transcript.into_turns(),
    }))
}
