use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Booking, BookingStatus};
use crate::services::cache::AvailabilityCache;

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("booking not found")]
    NotFound,

    #[error("cannot move booking from {from} to {to}")]
    Invalid {
        from: &'static str,
        to: &'static str,
    },

    #[error("booking on {date} cannot be completed before that day")]
    TooEarlyToComplete { date: NaiveDate },

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Apply one lifecycle transition. Unavailability is derived live from
/// status, so moving out of pending/confirmed releases the interval by
/// itself; the cached resolver still needs an explicit invalidation.
pub fn transition(
    conn: &Connection,
    cache: &AvailabilityCache,
    booking_id: &str,
    to: BookingStatus,
    today: NaiveDate,
) -> Result<Booking, TransitionError> {
    let booking =
        queries::get_booking_by_id(conn, booking_id)?.ok_or(TransitionError::NotFound)?;

    if !booking.status.can_transition_to(to) {
        return Err(TransitionError::Invalid {
            from: booking.status.as_str(),
            to: to.as_str(),
        });
    }

    // Cleaners mark jobs done on the day or after, never ahead of time.
    if to == BookingStatus::Completed && today < booking.date {
        return Err(TransitionError::TooEarlyToComplete { date: booking.date });
    }

    queries::update_booking_status(conn, booking_id, to)?;
    let updated = queries::get_booking_by_id(conn, booking_id)?.ok_or(TransitionError::NotFound)?;

    cache.invalidate_date(&updated.cleaner_id, updated.date);

    tracing::info!(
        booking_id = %booking_id,
        from = booking.status.as_str(),
        to = to.as_str(),
        "booking transition"
    );

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::parse_time;
    use crate::services::availability;
    use chrono::Utc;
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

    fn seed_booking(conn: &Connection, id: &str, date_s: &str, status: BookingStatus) {
        let now = Utc::now().naive_utc();
        queries::create_booking(
            conn,
            &Booking {
                id: id.to_string(),
                cleaner_id: "c1".to_string(),
                owner_id: "o1".to_string(),
                property_id: "p1".to_string(),
                status,
                service: "standard_clean".to_string(),
                date: date(date_s),
                start_min: parse_time("10:00").unwrap(),
                hours: 2,
                price: 50.0,
                created_by_ai: false,
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_pending_to_confirmed() {
        let conn = setup_db();
        seed_booking(&conn, "bk1", "2031-06-01", BookingStatus::Pending);

        let updated = transition(&conn, &cache(), "bk1", BookingStatus::Confirmed, date("2031-05-01")).unwrap();
        assert_eq!(updated.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_complete_pending_rejected() {
        let conn = setup_db();
        seed_booking(&conn, "bk1", "2031-06-01", BookingStatus::Pending);

        let result = transition(&conn, &cache(), "bk1", BookingStatus::Completed, date("2031-06-01"));
        assert!(matches!(
            result,
            Err(TransitionError::Invalid { from: "pending", to: "completed" })
        ));
    }

    #[test]
    fn test_complete_before_booking_date_rejected() {
        let conn = setup_db();
        seed_booking(&conn, "bk1", "2031-06-10", BookingStatus::Confirmed);

        let result = transition(&conn, &cache(), "bk1", BookingStatus::Completed, date("2031-06-09"));
        assert!(matches!(result, Err(TransitionError::TooEarlyToComplete { .. })));

        // same day works
        let updated = transition(&conn, &cache(), "bk1", BookingStatus::Completed, date("2031-06-10")).unwrap();
        assert_eq!(updated.status, BookingStatus::Completed);
    }

    #[test]
    fn test_cancel_completed_rejected() {
        let conn = setup_db();
        seed_booking(&conn, "bk1", "2031-06-01", BookingStatus::Completed);

        let result = transition(&conn, &cache(), "bk1", BookingStatus::Cancelled, date("2031-06-02"));
        assert!(matches!(result, Err(TransitionError::Invalid { .. })));
    }

    #[test]
    fn test_unknown_booking() {
        let conn = setup_db();
        let result = transition(&conn, &cache(), "nope", BookingStatus::Confirmed, date("2031-06-01"));
        assert!(matches!(result, Err(TransitionError::NotFound)));
    }

    #[test]
    fn test_cancellation_releases_interval() {
        let conn = setup_db();
        seed_booking(&conn, "bk1", "2031-06-01", BookingStatus::Confirmed);
        let d = date("2031-06-01");

        let before = availability::unavailable_intervals(&conn, "c1", &d).unwrap();
        assert_eq!(before.len(), 1);

        transition(&conn, &cache(), "bk1", BookingStatus::Cancelled, d).unwrap();

        let after = availability::unavailable_intervals(&conn, "c1", &d).unwrap();
        assert!(after.is_empty());
    }
}
