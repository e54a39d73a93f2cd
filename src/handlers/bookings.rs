use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{parse_time, Booking, BookingStatus};
use crate::services::guard::{self, BookingRequest, GuardError};
use crate::services::lifecycle::{self, TransitionError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingBody {
    pub cleaner_id: String,
    pub owner_id: String,
    pub property_id: String,
    pub service: String,
    pub date: String,
    pub time: String,
    pub hours: i64,
    /// Owners booking through the dashboard start pending; a cleaner
    /// booking on their own behalf can confirm directly.
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
pub struct BookingView {
    pub id: String,
    pub cleaner_id: String,
    pub owner_id: String,
    pub property_id: String,
    pub status: BookingStatus,
    pub service: String,
    pub date: NaiveDate,
    pub time: String,
    pub end_time: String,
    pub hours: i64,
    pub price: f64,
    pub created_by_ai: bool,
}

impl From<&Booking> for BookingView {
    fn from(booking: &Booking) -> Self {
        let range = booking.time_range();
        Self {
            id: booking.id.clone(),
            cleaner_id: booking.cleaner_id.clone(),
            owner_id: booking.owner_id.clone(),
            property_id: booking.property_id.clone(),
            status: booking.status,
            service: booking.service.clone(),
            date: booking.date,
            time: range.start_str(),
            end_time: range.end_str(),
            hours: booking.hours,
            price: booking.price,
            created_by_ai: booking.created_by_ai,
        }
    }
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingBody>,
) -> Result<(StatusCode, Json<BookingView>), AppError> {
    let date = NaiveDate::parse_from_str(&body.date, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("invalid date: {}", body.date)))?;
    let start_min =
        parse_time(&body.time).map_err(|e| AppError::BadRequest(e.to_string()))?;
    if body.hours <= 0 {
        return Err(AppError::BadRequest("hours must be positive".to_string()));
    }

    let mut db = state.db.lock().unwrap();

    let cleaner = queries::get_cleaner(&db, &body.cleaner_id)?
        .ok_or_else(|| AppError::NotFound(format!("cleaner {}", body.cleaner_id)))?;
    if queries::get_owner(&db, &body.owner_id)?.is_none() {
        return Err(AppError::NotFound(format!("owner {}", body.owner_id)));
    }
    if queries::get_property(&db, &body.property_id)?.is_none() {
        return Err(AppError::NotFound(format!("property {}", body.property_id)));
    }

    let request = BookingRequest {
        cleaner_id: body.cleaner_id,
        owner_id: body.owner_id,
        property_id: body.property_id,
        service: body.service,
        date,
        start_min,
        hours: body.hours,
        price: cleaner.hourly_rate * body.hours as f64,
        created_by_ai: false,
        confirmed: body.confirm,
    };

    match guard::try_create_booking(&mut db, &state.availability_cache, &request) {
        Ok(booking) => Ok((StatusCode::CREATED, Json(BookingView::from(&booking)))),
        Err(GuardError::Conflict(reason)) => Err(AppError::Conflict(reason)),
        Err(GuardError::Database(e)) => Err(AppError::Internal(e)),
    }
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookingView>, AppError> {
    let db = state.db.lock().unwrap();
    let booking = queries::get_booking_by_id(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
    Ok(Json(BookingView::from(&booking)))
}

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    pub status: BookingStatus,
}

pub async fn transition_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<TransitionBody>,
) -> Result<Json<BookingView>, AppError> {
    let today = Utc::now().naive_utc().date();

    let db = state.db.lock().unwrap();
    match lifecycle::transition(&db, &state.availability_cache, &id, body.status, today) {
        Ok(booking) => Ok(Json(BookingView::from(&booking))),
        Err(TransitionError::NotFound) => Err(AppError::NotFound(format!("booking {id}"))),
        Err(TransitionError::Database(e)) => Err(AppError::Internal(e)),
        Err(e) => Err(AppError::InvalidTransition(e)),
    }
}
