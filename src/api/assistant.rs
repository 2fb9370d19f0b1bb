//! Chat assistant endpoints.

use axum::{extract::State, Json};

use super::{error, revision, success, ApiResult};
use crate::assistant::{AssistantStatus, ChatReply, ChatRequest};
use crate::AppState;

/// GET /api/assistant/status - Whether the chat is available.
pub async fn assistant_status(State(state): State<AppState>) -> ApiResult<AssistantStatus> {
    let revision_id = revision(&state).await;
    let info = state.content.site_info.get();
    success(state.assistant.status(&info), revision_id)
}

/// POST /api/assistant/chat - One chat turn.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatReply> {
    let revision_id = revision(&state).await;
    let info = state.content.site_info.get();

    match state
        .assistant
        .chat(&info, &request.history, &request.message)
        .await
    {
        Ok(reply) => success(ChatReply { reply }, revision_id),
        Err(e) => error(e, revision_id),
    }
}
