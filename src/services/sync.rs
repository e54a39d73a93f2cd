use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::models::interval::MINUTES_PER_DAY;
use crate::models::{AvailabilityBlock, BlockSource, SyncStatus, TimeRange};
use crate::services::calendar::{BusyInterval, CalendarError};
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
pub enum SyncWindow {
    /// Dashboard-triggered full sync.
    Full,
    /// Short look-ahead used when the agent needs fresh context quickly.
    AgentContext,
}

impl SyncWindow {
    pub fn days(self) -> i64 {
        match self {
            SyncWindow::Full => 60,
            SyncWindow::AgentContext => 14,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncOutcome {
    pub synced_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Pull busy intervals from the cleaner's external calendar and replace
/// their GOOGLE_CALENDAR blocks wholesale. Failures degrade: auth errors
/// disconnect the calendar, transient errors get one retry then give up.
/// Neither propagates to the caller — booking flows keep working off
/// whatever blocks are stored.
pub async fn sync_cleaner(
    state: &AppState,
    cleaner_id: &str,
    window: SyncWindow,
) -> anyhow::Result<SyncOutcome> {
    let cleaner = {
        let db = state.db.lock().unwrap();
        queries::get_cleaner(&db, cleaner_id)?
    }
    .ok_or_else(|| anyhow::anyhow!("unknown cleaner: {cleaner_id}"))?;

    let token = match cleaner.google_refresh_token {
        Some(ref token) if cleaner.calendar_connected => token.clone(),
        _ => {
            return Ok(SyncOutcome {
                synced_count: 0,
                error: Some("calendar not connected".to_string()),
            })
        }
    };

    {
        let db = state.db.lock().unwrap();
        queries::set_sync_status(&db, cleaner_id, SyncStatus::Syncing)?;
    }

    let time_min = Utc::now();
    let time_max = time_min + Duration::days(window.days());

    let mut result = state.calendar.fetch_busy(&token, time_min, time_max).await;
    if matches!(result, Err(CalendarError::Transient(_))) {
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        result = state.calendar.fetch_busy(&token, time_min, time_max).await;
    }

    let busy = match result {
        Ok(busy) => busy,
        Err(CalendarError::Auth(msg)) => {
            tracing::warn!(cleaner_id, error = %msg, "calendar token rejected, disconnecting");
            let db = state.db.lock().unwrap();
            queries::mark_calendar_disconnected(&db, cleaner_id)?;
            return Ok(SyncOutcome {
                synced_count: 0,
                error: Some(msg),
            });
        }
        Err(CalendarError::Transient(msg)) => {
            tracing::warn!(cleaner_id, error = %msg, "calendar sync failed");
            let db = state.db.lock().unwrap();
            queries::set_sync_status(&db, cleaner_id, SyncStatus::Error)?;
            return Ok(SyncOutcome {
                synced_count: 0,
                error: Some(msg),
            });
        }
    };

    let segments = normalize_busy(&busy);

    let synced_count = {
        let mut db = state.db.lock().unwrap();
        match replace_google_blocks(&mut db, cleaner_id, &segments) {
            Ok(count) => count,
            Err(e) => {
                // don't leave the cleaner stuck in 'syncing'
                let _ = queries::set_sync_status(&db, cleaner_id, SyncStatus::Error);
                return Err(e);
            }
        }
    };

    state.availability_cache.invalidate_cleaner(cleaner_id);

    tracing::info!(cleaner_id, synced_count, "calendar sync complete");

    Ok(SyncOutcome {
        synced_count,
        error: None,
    })
}

/// Split provider busy intervals into per-day half-open segments.
/// Malformed entries are logged and skipped rather than failing the sync.
pub fn normalize_busy(busy: &[BusyInterval]) -> Vec<(NaiveDate, TimeRange)> {
    let mut segments = Vec::new();

    for interval in busy {
        let start = match DateTime::parse_from_rfc3339(&interval.start) {
            Ok(dt) => dt.with_timezone(&Utc).naive_utc(),
            Err(e) => {
                tracing::warn!(start = %interval.start, error = %e, "skipping malformed busy interval");
                continue;
            }
        };
        let end = match DateTime::parse_from_rfc3339(&interval.end) {
            Ok(dt) => dt.with_timezone(&Utc).naive_utc(),
            Err(e) => {
                tracing::warn!(end = %interval.end, error = %e, "skipping malformed busy interval");
                continue;
            }
        };
        if end <= start {
            tracing::warn!(start = %interval.start, end = %interval.end, "skipping inverted busy interval");
            continue;
        }

        let mut day = start.date();
        while day <= end.date() {
            let seg_start = if day == start.date() {
                start.time().hour() * 60 + start.time().minute()
            } else {
                0
            };
            let seg_end = if day == end.date() {
                end.time().hour() * 60 + end.time().minute()
            } else {
                MINUTES_PER_DAY
            };

            if seg_end > seg_start {
                // bounds already validated, new() cannot fail here
                if let Ok(range) = TimeRange::new(seg_start, seg_end) {
                    segments.push((day, range));
                }
            }

            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
    }

    segments
}

/// Generation-tagged replace: insert the fresh batch under a new
/// generation, then drop every older-generation calendar row, all in one
/// transaction. At no point does the cleaner have zero calendar blocks
/// while busy intervals exist.
pub fn replace_google_blocks(
    conn: &mut Connection,
    cleaner_id: &str,
    segments: &[(NaiveDate, TimeRange)],
) -> anyhow::Result<usize> {
    let tx = conn.transaction()?;

    let generation = queries::max_google_generation(&tx, cleaner_id)? + 1;

    for (date, range) in segments {
        queries::upsert_google_block(
            &tx,
            &AvailabilityBlock {
                id: uuid::Uuid::new_v4().to_string(),
                cleaner_id: cleaner_id.to_string(),
                date: *date,
                range: *range,
                is_available: false,
                source: BlockSource::GoogleCalendar,
                sync_generation: generation,
            },
        )?;
    }

    let removed = queries::delete_stale_google_blocks(&tx, cleaner_id, generation)?;
    queries::mark_synced(&tx, cleaner_id, &Utc::now().naive_utc())?;

    tx.commit()?;

    if removed > 0 {
        tracing::debug!(cleaner_id, removed, "dropped stale calendar blocks");
    }

    Ok(segments.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::parse_time;

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        conn.execute(
            "INSERT INTO cleaners (id, name, calendar_connected, google_refresh_token)
             VALUES ('c1', 'Maria', 1, 'tok')",
            [],
        )
        .unwrap();
        conn
    }

    fn busy(start: &str, end: &str) -> BusyInterval {
        BusyInterval {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_normalize_single_day() {
        let segments = normalize_busy(&[busy("2031-06-05T09:00:00Z", "2031-06-05T12:00:00Z")]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].0, date("2031-06-05"));
        assert_eq!(segments[0].1.start_str(), "09:00");
        assert_eq!(segments[0].1.end_str(), "12:00");
    }

    #[test]
    fn test_normalize_splits_multi_day() {
        let segments = normalize_busy(&[busy("2031-06-05T22:00:00Z", "2031-06-07T08:00:00Z")]);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], (date("2031-06-05"), TimeRange::new(22 * 60, MINUTES_PER_DAY).unwrap()));
        assert_eq!(segments[1], (date("2031-06-06"), TimeRange::new(0, MINUTES_PER_DAY).unwrap()));
        assert_eq!(segments[2], (date("2031-06-07"), TimeRange::new(0, 8 * 60).unwrap()));
    }

    #[test]
    fn test_normalize_skips_malformed() {
        let segments = normalize_busy(&[
            busy("not-a-timestamp", "2031-06-05T12:00:00Z"),
            busy("2031-06-05T12:00:00Z", "2031-06-05T09:00:00Z"),
            busy("2031-06-05T13:00:00Z", "2031-06-05T14:00:00Z"),
        ]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].1.start_str(), "13:00");
    }

    #[test]
    fn test_replace_is_idempotent() {
        let mut conn = setup_db();
        let segments = vec![
            (date("2031-06-05"), TimeRange::from_strs("09:00", "12:00").unwrap()),
            (date("2031-06-06"), TimeRange::from_strs("14:00", "16:00").unwrap()),
        ];

        replace_google_blocks(&mut conn, "c1", &segments).unwrap();
        replace_google_blocks(&mut conn, "c1", &segments).unwrap();

        assert_eq!(queries::count_google_blocks(&conn, "c1").unwrap(), 2);
    }

    #[test]
    fn test_replace_removes_stale_blocks() {
        let mut conn = setup_db();
        let first = vec![(date("2031-06-05"), TimeRange::from_strs("09:00", "12:00").unwrap())];
        replace_google_blocks(&mut conn, "c1", &first).unwrap();

        // event no longer on the external calendar
        let second = vec![(date("2031-06-08"), TimeRange::from_strs("10:00", "11:00").unwrap())];
        replace_google_blocks(&mut conn, "c1", &second).unwrap();

        let remaining = queries::blocks_for_date(&conn, "c1", &date("2031-06-05")).unwrap();
        assert!(remaining.is_empty());
        assert_eq!(queries::count_google_blocks(&conn, "c1").unwrap(), 1);
    }

    #[test]
    fn test_replace_leaves_manual_blocks_alone() {
        let mut conn = setup_db();
        queries::insert_block(
            &conn,
            &AvailabilityBlock {
                id: "m1".to_string(),
                cleaner_id: "c1".to_string(),
                date: date("2031-06-05"),
                range: TimeRange::new(parse_time("08:00").unwrap(), parse_time("09:00").unwrap()).unwrap(),
                is_available: false,
                source: BlockSource::Manual,
                sync_generation: 0,
            },
        )
        .unwrap();

        replace_google_blocks(&mut conn, "c1", &[]).unwrap();

        let blocks = queries::blocks_for_date(&conn, "c1", &date("2031-06-05")).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].source, BlockSource::Manual);
    }

    #[test]
    fn test_replace_updates_sync_state() {
        let mut conn = setup_db();
        replace_google_blocks(&mut conn, "c1", &[]).unwrap();

        let cleaner = queries::get_cleaner(&conn, "c1").unwrap().unwrap();
        assert_eq!(cleaner.sync_status, SyncStatus::Synced);
        assert!(cleaner.last_synced_at.is_some());
    }
}
