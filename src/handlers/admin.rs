use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::bookings::BookingView;
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, state: &AppState) -> Result<(), AppError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(token) if token == state.config.admin_token => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

#[derive(Debug, Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    check_auth(&headers, &state)?;

    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let db = state.db.lock().unwrap();
    let bookings = queries::get_all_bookings(&db, query.status.as_deref(), limit)?;

    Ok(Json(bookings.iter().map(BookingView::from).collect()))
}

pub async fn list_cleaners(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    check_auth(&headers, &state)?;

    let db = state.db.lock().unwrap();
    let cleaners = queries::list_cleaners(&db)?;

    let items: Vec<Value> = cleaners
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "hourly_rate": c.hourly_rate,
                "service_areas": c.service_areas,
                "calendar_connected": c.calendar_connected,
                "sync_status": c.sync_status.as_str(),
                "last_synced_at": c.last_synced_at.map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string()),
                "total_bookings": c.total_bookings,
            })
        })
        .collect();

    Ok(Json(json!({ "cleaners": items })))
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    check_auth(&headers, &state)?;

    let db = state.db.lock().unwrap();
    let stats = queries::get_dashboard_stats(&db)?;

    Ok(Json(json!({
        "upcoming_confirmed": stats.upcoming_confirmed,
        "ai_created": stats.ai_created,
        "cleaner_count": stats.cleaner_count,
    })))
}
