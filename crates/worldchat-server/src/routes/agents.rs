//! Agent endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use worldchat_core::storage::{AgentStore, Database};

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::types::{AgentResponse, CreateAgentRequest};
use crate::AppState;

/// Build the agents router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_agents).post(create_agent))
        .route("/public", get(list_public_agents))
        .route("/:id", delete(delete_agent))
        .route("/:id/share", post(share_agent))
        .route("/:id/copy", post(copy_agent))
}

/// List the caller's private agents
async fn list_agents(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
) -> Result<Json<Vec<AgentResponse>>, AppError> {
    let db = Database::new(&state.db_path)?;
    let user_id = user.as_ref().and_then(|u| u.user_id());
    let agents = AgentStore::new(&db).list_private(user_id)?;

    Ok(Json(agents.into_iter().map(Into::into).collect()))
}

async fn list_public_agents(
    State(state): State<AppState>,
) -> Result<Json<Vec<AgentResponse>>, AppError> {
    let db = Database::new(&state.db_path)?;
    let agents = AgentStore::new(&db).list_public()?;

    Ok(Json(agents.into_iter().map(Into::into).collect()))
}

/// Create a private agent; name collisions with the caller's agents are rejected
async fn create_agent(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Json(req): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<AgentResponse>), AppError> {
    let db = Database::new(&state.db_path)?;
    let user_id = user.as_ref().and_then(|u| u.user_id());
    let agent = AgentStore::new(&db).create(
        req.name.as_deref(),
        req.description.as_deref(),
        user_id,
    )?;

    tracing::info!(agent = %agent.id, name = %agent.name, "Agent created");
    Ok((StatusCode::CREATED, Json(agent.into())))
}

/// Another user's agent reads as missing
fn ensure_owned(store: &AgentStore<'_>, id: &str, user_id: Option<&str>) -> Result<(), AppError> {
    if !store.verify_ownership(id, user_id)? {
        return Err(AppError::NotFound(format!("Agent {} not found", id)));
    }
    Ok(())
}

async fn delete_agent(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let db = Database::new(&state.db_path)?;
    let store = AgentStore::new(&db);
    ensure_owned(&store, &id, user.as_ref().and_then(|u| u.user_id()))?;

    if !store.delete(&id)? {
        return Err(AppError::NotFound(format!("Agent {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Publish one of the caller's agents to the shared pool
async fn share_agent(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<AgentResponse>, AppError> {
    let db = Database::new(&state.db_path)?;
    let store = AgentStore::new(&db);
    ensure_owned(&store, &id, user.as_ref().and_then(|u| u.user_id()))?;

    let agent = store.share(&id)?;
    Ok(Json(agent.into()))
}

/// Copy a public agent into the caller's private agents
async fn copy_agent(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<AgentResponse>), AppError> {
    let db = Database::new(&state.db_path)?;
    let user_id = user.as_ref().and_then(|u| u.user_id());
    let agent = AgentStore::new(&db).copy_public(&id, user_id)?;
    Ok((StatusCode::CREATED, Json(agent.into())))
}
