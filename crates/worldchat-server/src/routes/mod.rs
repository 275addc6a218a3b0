//! API routes

use axum::Router;

use crate::AppState;

mod agents;
mod conversations;
mod world_groups;

/// Build the API router with all endpoints
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/agents", agents::router())
        .nest("/world-groups", world_groups::router())
        .nest("/conversations", conversations::router())
}
