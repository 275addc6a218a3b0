//! World group endpoints: groups, memberships, lines and generation control

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use worldchat_core::generation::SchedulerStatus;
use worldchat_core::storage::{Database, LineStore, WorldGroupStore};

use crate::error::AppError;
use crate::types::{
    AddMemberRequest, AgentResponse, CreateWorldGroupRequest, LineResponse,
    WorldGroupDetailResponse, WorldGroupResponse,
};
use crate::AppState;

/// Build the world groups router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_groups).post(create_group))
        .route("/:id", get(get_group).delete(delete_group))
        .route("/:id/members", get(list_members).post(add_member))
        .route("/:id/members/:agent_id", delete(remove_member))
        .route("/:id/lines", get(list_lines))
        .route("/:id/generation", get(generation_status))
        .route("/:id/generation/start", post(start_generation))
        .route("/:id/generation/stop", post(stop_generation))
        .route("/:id/generation/pause", post(pause_generation))
        .route("/:id/generation/resume", post(resume_generation))
        .route("/:id/generation/trigger", post(trigger_generation))
}

fn ensure_group_exists(state: &AppState, id: &str) -> Result<(), AppError> {
    let db = Database::new(&state.db_path)?;
    match WorldGroupStore::new(&db).get(id)? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("World group {} not found", id))),
    }
}

/// List world groups, newest first
async fn list_groups(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorldGroupResponse>>, AppError> {
    let db = Database::new(&state.db_path)?;
    let groups = WorldGroupStore::new(&db).list()?;
    Ok(Json(groups.into_iter().map(Into::into).collect()))
}

async fn create_group(
    State(state): State<AppState>,
    Json(req): Json<CreateWorldGroupRequest>,
) -> Result<(StatusCode, Json<WorldGroupDetailResponse>), AppError> {
    let db = Database::new(&state.db_path)?;
    let store = WorldGroupStore::new(&db);

    let group = store.create_with_members(
        &req.name,
        req.theme,
        req.description.as_deref(),
        &req.agent_ids,
    )?;
    let members = store.members(&group.id)?;

    tracing::info!(group = %group.id, theme = %group.theme, "World group created");
    Ok((
        StatusCode::CREATED,
        Json(WorldGroupDetailResponse {
            generation: state.schedulers.status(&group.id),
            group: group.into(),
            members: members.into_iter().map(Into::into).collect(),
        }),
    ))
}

/// A group with its members and generation status
async fn get_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorldGroupDetailResponse>, AppError> {
    let db = Database::new(&state.db_path)?;
    let store = WorldGroupStore::new(&db);

    let group = store
        .get(&id)?
        .ok_or_else(|| AppError::NotFound(format!("World group {} not found", id)))?;
    let members = store.members(&id)?;

    Ok(Json(WorldGroupDetailResponse {
        group: group.into(),
        members: members.into_iter().map(Into::into).collect(),
        generation: state.schedulers.status(&id),
    }))
}

/// Delete a group; its scheduler and realtime channel go with it
async fn delete_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.schedulers.dispose(&id);

    let db = Database::new(&state.db_path)?;
    if !WorldGroupStore::new(&db).delete(&id)? {
        return Err(AppError::NotFound(format!("World group {} not found", id)));
    }
    state.hub.remove(&id);

    tracing::info!(group = %id, "World group deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_members(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AgentResponse>>, AppError> {
    ensure_group_exists(&state, &id)?;
    let db = Database::new(&state.db_path)?;
    let members = WorldGroupStore::new(&db).members(&id)?;
    Ok(Json(members.into_iter().map(Into::into).collect()))
}

/// Add a member; adding an existing member is a no-op
async fn add_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> Result<Json<Vec<AgentResponse>>, AppError> {
    let db = Database::new(&state.db_path)?;
    let store = WorldGroupStore::new(&db);
    if store.add_member(&id, &req.agent_id)? {
        tracing::info!(group = %id, agent = %req.agent_id, "Member added");
    }
    let members = store.members(&id)?;
    Ok(Json(members.into_iter().map(Into::into).collect()))
}

async fn remove_member(
    State(state): State<AppState>,
    Path((id, agent_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let db = Database::new(&state.db_path)?;
    if !WorldGroupStore::new(&db).remove_member(&id, &agent_id)? {
        return Err(AppError::NotFound(format!(
            "Agent {} is not a member of world group {}",
            agent_id, id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Conversation lines, oldest first
async fn list_lines(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LineResponse>>, AppError> {
    ensure_group_exists(&state, &id)?;
    let db = Database::new(&state.db_path)?;
    let lines = LineStore::new(&db).list(&id)?;
    Ok(Json(lines.into_iter().map(Into::into).collect()))
}

// ============================================================================
// Generation control
// ============================================================================

async fn generation_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SchedulerStatus>, AppError> {
    ensure_group_exists(&state, &id)?;
    Ok(Json(state.schedulers.status(&id)))
}

async fn start_generation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SchedulerStatus>, AppError> {
    ensure_group_exists(&state, &id)?;
    Ok(Json(state.schedulers.start(&id).await?))
}

async fn stop_generation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SchedulerStatus>, AppError> {
    Ok(Json(state.schedulers.stop(&id).await?))
}

async fn pause_generation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SchedulerStatus>, AppError> {
    ensure_group_exists(&state, &id)?;
    Ok(Json(state.schedulers.pause(&id).await?))
}

async fn resume_generation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SchedulerStatus>, AppError> {
    ensure_group_exists(&state, &id)?;
    Ok(Json(state.schedulers.resume(&id).await?))
}

/// One manual attempt, subject to the same guards as the timer
async fn trigger_generation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SchedulerStatus>, AppError> {
    ensure_group_exists(&state, &id)?;
    Ok(Json(state.schedulers.trigger(&id).await?))
}
