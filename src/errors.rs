use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::guard::ConflictReason;
use crate::services::lifecycle::TransitionError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("booking conflict: {0}")]
    Conflict(ConflictReason),

    #[error("{0}")]
    InvalidTransition(TransitionError),

    #[error("calendar provider error: {0}")]
    Calendar(String),

    #[error("AI provider error: {0}")]
    Ai(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Calendar(_) => StatusCode::BAD_GATEWAY,
            AppError::Ai(_) => StatusCode::BAD_GATEWAY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            AppError::Conflict(reason) => serde_json::json!({
                "error": self.to_string(),
                "reason": reason.as_str(),
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };

        (status, axum::Json(body)).into_response()
    }
}
