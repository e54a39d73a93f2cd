use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{parse_time, TimeRange};
use crate::services::availability::{self, UnavailableInterval};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub cleaner_id: String,
    pub date: String,
    /// Optional interval; defaults to the standard work day.
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub cleaner_id: String,
    pub date: NaiveDate,
    pub start: String,
    pub end: String,
    pub available: bool,
    pub intervals: Vec<IntervalView>,
}

#[derive(Debug, Serialize)]
pub struct IntervalView {
    pub start: String,
    pub end: String,
    pub source: &'static str,
}

impl From<&UnavailableInterval> for IntervalView {
    fn from(interval: &UnavailableInterval) -> Self {
        Self {
            start: interval.range.start_str(),
            end: interval.range.end_str(),
            source: interval.source.as_str(),
        }
    }
}

pub async fn check_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let date = parse_date(&query.date)?;
    let range = parse_range(query.start.as_deref(), query.end.as_deref())?;

    let db = state.db.lock().unwrap();
    if queries::get_cleaner(&db, &query.cleaner_id)?.is_none() {
        return Err(AppError::NotFound(format!(
            "cleaner {}",
            query.cleaner_id
        )));
    }

    let intervals = availability::cached_unavailable_intervals(
        &db,
        &state.availability_cache,
        &query.cleaner_id,
        &date,
    )?;

    let available = intervals.iter().all(|i| !i.range.overlaps(&range));

    Ok(Json(AvailabilityResponse {
        cleaner_id: query.cleaner_id,
        date,
        start: range.start_str(),
        end: range.end_str(),
        available,
        intervals: intervals.iter().map(IntervalView::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct NextAvailableQuery {
    pub cleaner_id: String,
    pub from: String,
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct NextAvailableResponse {
    pub cleaner_id: String,
    pub dates: Vec<NaiveDate>,
}

pub async fn next_available(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NextAvailableQuery>,
) -> Result<Json<NextAvailableResponse>, AppError> {
    let from = parse_date(&query.from)?;
    let count = query.count.unwrap_or(3).min(14);

    let db = state.db.lock().unwrap();
    if queries::get_cleaner(&db, &query.cleaner_id)?.is_none() {
        return Err(AppError::NotFound(format!(
            "cleaner {}",
            query.cleaner_id
        )));
    }

    let dates = availability::find_next_available(&db, &query.cleaner_id, from, count)?;

    Ok(Json(NextAvailableResponse {
        cleaner_id: query.cleaner_id,
        dates,
    }))
}

fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("invalid date: {s}")))
}

fn parse_range(start: Option<&str>, end: Option<&str>) -> Result<TimeRange, AppError> {
    match (start, end) {
        (None, None) => Ok(availability::default_work_day()),
        (Some(start), Some(end)) => {
            let start = parse_time(start)
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            let end = parse_time(end).map_err(|e| AppError::BadRequest(e.to_string()))?;
            TimeRange::new(start, end).map_err(|e| AppError::BadRequest(e.to_string()))
        }
        _ => Err(AppError::BadRequest(
            "start and end must be given together".to_string(),
        )),
    }
}
