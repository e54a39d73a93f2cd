use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::models::{parse_time, BlockSource, TimeRange};
use crate::services::cache::AvailabilityCache;

/// How far ahead `find_next_available` will look.
pub const SEARCH_HORIZON_DAYS: i64 = 14;

/// Default work-day probe used when a query gives no explicit interval.
pub fn default_work_day() -> TimeRange {
    TimeRange::new(parse_time("09:00").unwrap(), parse_time("17:00").unwrap()).unwrap()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UnavailableInterval {
    pub range: TimeRange,
    pub source: BlockSource,
}

/// Merge the three occupancy sources for one cleaner and date: manual
/// blocks, calendar-synced blocks, and pending/confirmed bookings.
/// Read-only; ordered by start time.
pub fn unavailable_intervals(
    conn: &Connection,
    cleaner_id: &str,
    date: &NaiveDate,
) -> anyhow::Result<Vec<UnavailableInterval>> {
    let mut intervals = Vec::new();

    for block in queries::blocks_for_date(conn, cleaner_id, date)? {
        if !block.is_available {
            intervals.push(UnavailableInterval {
                range: block.range,
                source: block.source,
            });
        }
    }

    for booking in queries::active_bookings_on(conn, cleaner_id, date)? {
        intervals.push(UnavailableInterval {
            range: booking.time_range(),
            source: BlockSource::Booking,
        });
    }

    intervals.sort_by_key(|i| (i.range.start_min, i.range.end_min));
    Ok(intervals)
}

/// Cache-through variant for read paths. Write paths never use this; the
/// guard re-reads inside its own transaction.
pub fn cached_unavailable_intervals(
    conn: &Connection,
    cache: &AvailabilityCache,
    cleaner_id: &str,
    date: &NaiveDate,
) -> anyhow::Result<Arc<Vec<UnavailableInterval>>> {
    if let Some(hit) = cache.get(cleaner_id, *date) {
        return Ok(hit);
    }
    let intervals = Arc::new(unavailable_intervals(conn, cleaner_id, date)?);
    cache.insert(cleaner_id, *date, Arc::clone(&intervals));
    Ok(intervals)
}

/// True iff no occupied interval overlaps the requested half-open range.
/// Boundary touching (one ends exactly when the other starts) is free.
pub fn is_available(
    conn: &Connection,
    cleaner_id: &str,
    date: &NaiveDate,
    range: &TimeRange,
) -> anyhow::Result<bool> {
    let intervals = unavailable_intervals(conn, cleaner_id, date)?;
    Ok(intervals.iter().all(|i| !i.range.overlaps(range)))
}

/// Up to `count` dates from `from` (inclusive) within the search horizon
/// whose default work day is fully free. Restartable: pass the day after
/// the last result as the next `from`.
pub fn find_next_available(
    conn: &Connection,
    cleaner_id: &str,
    from: NaiveDate,
    count: usize,
) -> anyhow::Result<Vec<NaiveDate>> {
    let probe = default_work_day();
    let mut found = Vec::with_capacity(count);

    for offset in 0..SEARCH_HORIZON_DAYS {
        if found.len() >= count {
            break;
        }
        let date = from + Duration::days(offset);
        if is_available(conn, cleaner_id, &date, &probe)? {
            found.push(date);
        }
    }

    Ok(found)
}
