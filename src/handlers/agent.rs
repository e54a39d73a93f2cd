use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Owner;
use crate::services::agent::{self, AgentError, AgentReply};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AgentMessageBody {
    pub cleaner_id: String,
    pub owner_id: String,
    /// Name used when the owner writes in for the first time.
    pub owner_name: Option<String>,
    pub message: String,
}

pub async fn agent_message(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AgentMessageBody>,
) -> Result<Json<AgentReply>, AppError> {
    if body.message.trim().is_empty() {
        return Err(AppError::BadRequest("message is empty".to_string()));
    }

    {
        let db = state.db.lock().unwrap();
        if queries::get_cleaner(&db, &body.cleaner_id)?.is_none() {
            return Err(AppError::NotFound(format!("cleaner {}", body.cleaner_id)));
        }
        // First contact creates the owner record on the fly.
        if queries::get_owner(&db, &body.owner_id)?.is_none() {
            queries::save_owner(
                &db,
                &Owner {
                    id: body.owner_id.clone(),
                    name: body.owner_name.unwrap_or_else(|| "Guest".to_string()),
                    total_bookings: 0,
                },
            )?;
        }
    }

    let reply = agent::handle_message(&state, &body.cleaner_id, &body.owner_id, &body.message)
        .await
        .map_err(|e| match e {
            AgentError::Llm(e) => AppError::Ai(e.to_string()),
            AgentError::Internal(e) => AppError::Internal(e),
        })?;

    Ok(Json(reply))
}
