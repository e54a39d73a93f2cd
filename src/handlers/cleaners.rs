use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{parse_time, AvailabilityBlock, BlockSource, TimeRange};
use crate::services::sync::{self, SyncOutcome, SyncWindow};
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct SyncBody {
    /// "full" (default, 60 days) or "agent" (14 days).
    pub window: Option<String>,
}

pub async fn sync_calendar(
    State(state): State<Arc<AppState>>,
    Path(cleaner_id): Path<String>,
    body: Option<Json<SyncBody>>,
) -> Result<Json<SyncOutcome>, AppError> {
    let window = match body.and_then(|Json(b)| b.window) {
        Some(ref w) if w == "agent" => SyncWindow::AgentContext,
        _ => SyncWindow::Full,
    };

    {
        let db = state.db.lock().unwrap();
        if queries::get_cleaner(&db, &cleaner_id)?.is_none() {
            return Err(AppError::NotFound(format!("cleaner {cleaner_id}")));
        }
    }

    let outcome = sync::sync_cleaner(&state, &cleaner_id, window).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct CreateBlockBody {
    pub date: String,
    pub start: String,
    pub end: String,
    /// Defaults to marking the interval unavailable.
    #[serde(default)]
    pub is_available: bool,
}

pub async fn create_block(
    State(state): State<Arc<AppState>>,
    Path(cleaner_id): Path<String>,
    Json(body): Json<CreateBlockBody>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let date = NaiveDate::parse_from_str(&body.date, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("invalid date: {}", body.date)))?;
    let start =
        parse_time(&body.start).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let end = parse_time(&body.end).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let range = TimeRange::new(start, end).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let block = AvailabilityBlock {
        id: uuid::Uuid::new_v4().to_string(),
        cleaner_id: cleaner_id.clone(),
        date,
        range,
        is_available: body.is_available,
        source: BlockSource::Manual,
        sync_generation: 0,
    };

    {
        let db = state.db.lock().unwrap();
        if queries::get_cleaner(&db, &cleaner_id)?.is_none() {
            return Err(AppError::NotFound(format!("cleaner {cleaner_id}")));
        }
        queries::insert_block(&db, &block)?;
    }

    state.availability_cache.invalidate_date(&cleaner_id, date);

    Ok((StatusCode::CREATED, Json(json!({ "id": block.id }))))
}

pub async fn delete_block(
    State(state): State<Arc<AppState>>,
    Path((cleaner_id, block_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let deleted = {
        let db = state.db.lock().unwrap();
        queries::delete_block(&db, &cleaner_id, &block_id)?
    };

    if !deleted {
        return Err(AppError::NotFound(format!("block {block_id}")));
    }

    state.availability_cache.invalidate_cleaner(&cleaner_id);

    Ok(Json(json!({ "deleted": true })))
}
