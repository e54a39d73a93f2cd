use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::db::queries;
use crate::models::{Booking, BookingStatus, TimeRange};
use crate::services::cache::AvailabilityCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConflictReason {
    AlreadyBooked,
    Blocked,
    PastDate,
}

impl ConflictReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictReason::AlreadyBooked => "ALREADY_BOOKED",
            ConflictReason::Blocked => "BLOCKED",
            ConflictReason::PastDate => "PAST_DATE",
        }
    }
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("booking conflict: {0}")]
    Conflict(ConflictReason),

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub cleaner_id: String,
    pub owner_id: String,
    pub property_id: String,
    pub service: String,
    pub date: NaiveDate,
    pub start_min: u32,
    pub hours: i64,
    pub price: f64,
    pub created_by_ai: bool,
    /// Agent bookings land confirmed directly; human requests start
    /// pending until the cleaner accepts.
    pub confirmed: bool,
}

/// The transactional gate every booking creation goes through, human or
/// agent. Availability is re-checked and the row inserted inside one
/// IMMEDIATE transaction, so two concurrent requests for an overlapping
/// interval cannot both commit — the check and the insert see the same
/// snapshot and the write lock serializes them.
pub fn try_create_booking(
    conn: &mut Connection,
    cache: &AvailabilityCache,
    req: &BookingRequest,
) -> Result<Booking, GuardError> {
    let today = Utc::now().naive_utc().date();
    if req.date < today {
        return Err(GuardError::Conflict(ConflictReason::PastDate));
    }

    let range = TimeRange::from_start_and_hours(req.start_min, req.hours)
        .map_err(GuardError::Database)?;

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| GuardError::Database(e.into()))?;

    for existing in queries::active_bookings_on(&tx, &req.cleaner_id, &req.date)? {
        if existing.time_range().overlaps(&range) {
            return Err(GuardError::Conflict(ConflictReason::AlreadyBooked));
        }
    }

    for block in queries::blocks_for_date(&tx, &req.cleaner_id, &req.date)? {
        if !block.is_available && block.range.overlaps(&range) {
            return Err(GuardError::Conflict(ConflictReason::Blocked));
        }
    }

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        cleaner_id: req.cleaner_id.clone(),
        owner_id: req.owner_id.clone(),
        property_id: req.property_id.clone(),
        status: if req.confirmed {
            BookingStatus::Confirmed
        } else {
            BookingStatus::Pending
        },
        service: req.service.clone(),
        date: req.date,
        start_min: req.start_min,
        hours: req.hours,
        price: req.price,
        created_by_ai: req.created_by_ai,
        created_at: now,
        updated_at: now,
    };

    queries::create_booking(&tx, &booking)?;
    queries::increment_cleaner_bookings(&tx, &req.cleaner_id)?;
    queries::increment_owner_bookings(&tx, &req.owner_id)?;

    tx.commit().map_err(|e| GuardError::Database(e.into()))?;

    cache.invalidate_date(&req.cleaner_id, req.date);

    tracing::info!(
        booking_id = %booking.id,
        cleaner_id = %booking.cleaner_id,
        date = %booking.date,
        by_ai = booking.created_by_ai,
        "booking created"
    );

    Ok(booking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{parse_time, AvailabilityBlock, BlockSource};
    use std::time::Duration;

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        conn.execute_batch(
            "INSERT INTO cleaners (id, name) VALUES ('c1', 'Maria');
             INSERT INTO owners (id, name) VALUES ('o1', 'Jan');
             INSERT INTO properties (id, owner_id, address) VALUES ('p1', 'o1', 'Villa Azul');",
        )
        .unwrap();
        conn
    }

    fn cache() -> AvailabilityCache {
        AvailabilityCache::new(Duration::from_secs(60))
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn request(date_s: &str, time: &str, hours: i64) -> BookingRequest {
        BookingRequest {
            cleaner_id: "c1".to_string(),
            owner_id: "o1".to_string(),
            property_id: "p1".to_string(),
            service: "standard_clean".to_string(),
            date: date(date_s),
            start_min: parse_time(time).unwrap(),
            hours,
            price: 75.0,
            created_by_ai: false,
            confirmed: true,
        }
    }

    #[test]
    fn test_create_succeeds_on_free_day() {
        let mut conn = setup_db();
        let booking = try_create_booking(&mut conn, &cache(), &request("2031-06-01", "10:00", 3)).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.time_range().end_str(), "13:00");
    }

    #[test]
    fn test_overlap_rejected_adjacent_accepted() {
        let mut conn = setup_db();
        let c = cache();
        // confirmed 10:00 for 3h occupies 10:00-13:00
        try_create_booking(&mut conn, &c, &request("2031-06-01", "10:00", 3)).unwrap();

        let overlapping = try_create_booking(&mut conn, &c, &request("2031-06-01", "11:00", 2));
        assert!(matches!(
            overlapping,
            Err(GuardError::Conflict(ConflictReason::AlreadyBooked))
        ));

        // 13:00 starts exactly when the first ends
        let adjacent = try_create_booking(&mut conn, &c, &request("2031-06-01", "13:00", 2));
        assert!(adjacent.is_ok());
    }

    #[test]
    fn test_blocked_interval_rejected() {
        let mut conn = setup_db();
        queries::insert_block(
            &conn,
            &AvailabilityBlock {
                id: "b1".to_string(),
                cleaner_id: "c1".to_string(),
                date: date("2031-06-01"),
                range: TimeRange::from_strs("09:00", "12:00").unwrap(),
                is_available: false,
                source: BlockSource::GoogleCalendar,
                sync_generation: 1,
            },
        )
        .unwrap();

        let result = try_create_booking(&mut conn, &cache(), &request("2031-06-01", "11:00", 2));
        assert!(matches!(
            result,
            Err(GuardError::Conflict(ConflictReason::Blocked))
        ));
    }

    #[test]
    fn test_past_date_rejected() {
        let mut conn = setup_db();
        let result = try_create_booking(&mut conn, &cache(), &request("2020-01-01", "10:00", 2));
        assert!(matches!(
            result,
            Err(GuardError::Conflict(ConflictReason::PastDate))
        ));
    }

    #[test]
    fn test_pending_booking_also_occupies() {
        let mut conn = setup_db();
        let c = cache();
        let mut pending = request("2031-06-01", "10:00", 2);
        pending.confirmed = false;
        let created = try_create_booking(&mut conn, &c, &pending).unwrap();
        assert_eq!(created.status, BookingStatus::Pending);

        let result = try_create_booking(&mut conn, &c, &request("2031-06-01", "10:00", 2));
        assert!(matches!(
            result,
            Err(GuardError::Conflict(ConflictReason::AlreadyBooked))
        ));
    }

    #[test]
    fn test_conflict_leaves_no_partial_state() {
        let mut conn = setup_db();
        let c = cache();
        try_create_booking(&mut conn, &c, &request("2031-06-01", "10:00", 3)).unwrap();
        let _ = try_create_booking(&mut conn, &c, &request("2031-06-01", "11:00", 2));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        let cleaner = queries::get_cleaner(&conn, "c1").unwrap().unwrap();
        assert_eq!(cleaner.total_bookings, 1);
        let owner = queries::get_owner(&conn, "o1").unwrap().unwrap();
        assert_eq!(owner.total_bookings, 1);
    }

    #[test]
    fn test_counters_increment_on_success() {
        let mut conn = setup_db();
        let c = cache();
        try_create_booking(&mut conn, &c, &request("2031-06-01", "09:00", 2)).unwrap();
        try_create_booking(&mut conn, &c, &request("2031-06-02", "09:00", 2)).unwrap();

        let cleaner = queries::get_cleaner(&conn, "c1").unwrap().unwrap();
        assert_eq!(cleaner.total_bookings, 2);
    }
}
