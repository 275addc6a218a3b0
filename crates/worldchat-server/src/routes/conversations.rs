//! Prompt-driven conversations

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

use worldchat_core::start_conversation;
use worldchat_core::storage::{ConversationStore, Database};

use crate::error::AppError;
use crate::types::{ConversationResponse, StartConversationRequest, StartConversationResponse};
use crate::AppState;

/// Build the conversations router
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_conversations).post(create_conversation))
}

async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<Vec<ConversationResponse>>, AppError> {
    let db = Database::new(&state.db_path)?;
    let conversations = ConversationStore::new(&db).list()?;
    Ok(Json(conversations.into_iter().map(Into::into).collect()))
}

/// Generate a conversation among the selected agents and seed a world group with it
async fn create_conversation(
    State(state): State<AppState>,
    Json(req): Json<StartConversationRequest>,
) -> Result<(StatusCode, Json<StartConversationResponse>), AppError> {
    let outcome = start_conversation(
        &state.db_path,
        state.generator.as_ref(),
        state.sink.as_ref(),
        &req.agent_ids,
        &req.prompt,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(outcome.into())))
}
