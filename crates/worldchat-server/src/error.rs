//! Unified error handling for the API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use worldchat_core::generation::GenerationError;
use worldchat_core::storage::StorageError;

/// API error response body
#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

/// Application error types
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            AppError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        (
            status,
            Json(ApiError {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(storage) = err.downcast_ref::<StorageError>() {
            return match storage {
                StorageError::NotFound { .. } => AppError::NotFound(storage.to_string()),
                StorageError::NameTaken(_) => AppError::Conflict(storage.to_string()),
                StorageError::NotPublic(_) | StorageError::Invalid(_) => {
                    AppError::BadRequest(storage.to_string())
                }
            };
        }

        if let Some(generation) = err.downcast_ref::<GenerationError>() {
            tracing::warn!("Generation unavailable: {}", generation);
            return AppError::Unavailable(generation.to_string());
        }

        // Log full error chain for debugging, return sanitized message to client
        tracing::error!("Internal error: {:?}", err);
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: anyhow::Error) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn storage_errors_map_to_client_statuses() {
        assert_eq!(
            status_of(StorageError::not_found("Agent", "x").into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(StorageError::NameTaken("Zed".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StorageError::Invalid("blank".into()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn generation_errors_are_unavailable() {
        let err = GenerationError::Configuration("no API key".into());
        assert_eq!(status_of(err.into()), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn other_errors_are_internal() {
        assert_eq!(
            status_of(anyhow::anyhow!("disk on fire")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
