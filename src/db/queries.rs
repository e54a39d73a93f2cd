use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{
    format_minutes, parse_time, AvailabilityBlock, BlockSource, Booking, BookingStatus, Cleaner,
    Owner, Property, SyncStatus, TimeRange,
};

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ── Cleaners ──

pub fn get_cleaner(conn: &Connection, id: &str) -> anyhow::Result<Option<Cleaner>> {
    let result = conn.query_row(
        "SELECT id, name, hourly_rate, service_areas, calendar_connected, google_refresh_token, last_synced_at, sync_status, total_bookings
         FROM cleaners WHERE id = ?1",
        params![id],
        |row| Ok(parse_cleaner_row(row)),
    );

    match result {
        Ok(cleaner) => Ok(Some(cleaner?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_cleaner(conn: &Connection, cleaner: &Cleaner) -> anyhow::Result<()> {
    let service_areas = serde_json::to_string(&cleaner.service_areas)?;
    let last_synced_at = cleaner
        .last_synced_at
        .map(|dt| dt.format(DATETIME_FMT).to_string());

    conn.execute(
        "INSERT INTO cleaners (id, name, hourly_rate, service_areas, calendar_connected, google_refresh_token, last_synced_at, sync_status, total_bookings)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           hourly_rate = excluded.hourly_rate,
           service_areas = excluded.service_areas,
           calendar_connected = excluded.calendar_connected,
           google_refresh_token = excluded.google_refresh_token,
           last_synced_at = excluded.last_synced_at,
           sync_status = excluded.sync_status,
           updated_at = datetime('now')",
        params![
            cleaner.id,
            cleaner.name,
            cleaner.hourly_rate,
            service_areas,
            cleaner.calendar_connected as i32,
            cleaner.google_refresh_token,
            last_synced_at,
            cleaner.sync_status.as_str(),
            cleaner.total_bookings,
        ],
    )?;
    Ok(())
}

pub fn list_cleaners(conn: &Connection) -> anyhow::Result<Vec<Cleaner>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, hourly_rate, service_areas, calendar_connected, google_refresh_token, last_synced_at, sync_status, total_bookings
         FROM cleaners ORDER BY name ASC",
    )?;

    let rows = stmt.query_map([], |row| Ok(parse_cleaner_row(row)))?;

    let mut cleaners = vec![];
    for row in rows {
        cleaners.push(row??);
    }
    Ok(cleaners)
}

pub fn set_sync_status(conn: &Connection, id: &str, status: SyncStatus) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE cleaners SET sync_status = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(())
}

/// Expired or revoked token: drop the connection entirely so the dashboard
/// can prompt a reconnect.
pub fn mark_calendar_disconnected(conn: &Connection, id: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE cleaners SET calendar_connected = 0, google_refresh_token = NULL,
           sync_status = 'error', updated_at = datetime('now')
         WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

pub fn mark_synced(conn: &Connection, id: &str, at: &NaiveDateTime) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE cleaners SET sync_status = 'synced', last_synced_at = ?1, updated_at = datetime('now')
         WHERE id = ?2",
        params![at.format(DATETIME_FMT).to_string(), id],
    )?;
    Ok(())
}

pub fn increment_cleaner_bookings(conn: &Connection, id: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE cleaners SET total_bookings = total_bookings + 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

fn parse_cleaner_row(row: &rusqlite::Row) -> anyhow::Result<Cleaner> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let hourly_rate: f64 = row.get(2)?;
    let service_areas_json: String = row.get(3)?;
    let calendar_connected: bool = row.get::<_, i32>(4)? != 0;
    let google_refresh_token: Option<String> = row.get(5)?;
    let last_synced_at_str: Option<String> = row.get(6)?;
    let sync_status_str: String = row.get(7)?;
    let total_bookings: i64 = row.get(8)?;

    let service_areas: Vec<String> =
        serde_json::from_str(&service_areas_json).unwrap_or_default();
    let last_synced_at = last_synced_at_str
        .and_then(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FMT).ok());

    Ok(Cleaner {
        id,
        name,
        hourly_rate,
        service_areas,
        calendar_connected,
        google_refresh_token,
        last_synced_at,
        sync_status: SyncStatus::parse(&sync_status_str),
        total_bookings,
    })
}

// ── Owners ──

pub fn get_owner(conn: &Connection, id: &str) -> anyhow::Result<Option<Owner>> {
    let result = conn.query_row(
        "SELECT id, name, total_bookings FROM owners WHERE id = ?1",
        params![id],
        |row| {
            Ok(Owner {
                id: row.get(0)?,
                name: row.get(1)?,
                total_bookings: row.get(2)?,
            })
        },
    );

    match result {
        Ok(owner) => Ok(Some(owner)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_owner(conn: &Connection, owner: &Owner) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO owners (id, name, total_bookings) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        params![owner.id, owner.name, owner.total_bookings],
    )?;
    Ok(())
}

pub fn increment_owner_bookings(conn: &Connection, id: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE owners SET total_bookings = total_bookings + 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

// ── Properties ──

pub fn create_property(conn: &Connection, property: &Property) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO properties (id, owner_id, address, bedrooms, bathrooms, is_placeholder)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            property.id,
            property.owner_id,
            property.address,
            property.bedrooms,
            property.bathrooms,
            property.is_placeholder as i32,
        ],
    )?;
    Ok(())
}

pub fn get_property(conn: &Connection, id: &str) -> anyhow::Result<Option<Property>> {
    let result = conn.query_row(
        "SELECT id, owner_id, address, bedrooms, bathrooms, is_placeholder
         FROM properties WHERE id = ?1",
        params![id],
        |row| Ok(parse_property_row(row)),
    );

    match result {
        Ok(property) => Ok(Some(property?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_properties_for_owner(conn: &Connection, owner_id: &str) -> anyhow::Result<Vec<Property>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, address, bedrooms, bathrooms, is_placeholder
         FROM properties WHERE owner_id = ?1 ORDER BY created_at ASC",
    )?;

    let rows = stmt.query_map(params![owner_id], |row| Ok(parse_property_row(row)))?;

    let mut properties = vec![];
    for row in rows {
        properties.push(row??);
    }
    Ok(properties)
}

fn parse_property_row(row: &rusqlite::Row) -> anyhow::Result<Property> {
    Ok(Property {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        address: row.get(2)?,
        bedrooms: row.get(3)?,
        bathrooms: row.get(4)?,
        is_placeholder: row.get::<_, i32>(5)? != 0,
    })
}

// ── Availability Blocks ──

pub fn insert_block(conn: &Connection, block: &AvailabilityBlock) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO availability_blocks (id, cleaner_id, date, start_time, end_time, is_available, source, sync_generation)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            block.id,
            block.cleaner_id,
            block.date.format(DATE_FMT).to_string(),
            format_minutes(block.range.start_min),
            format_minutes(block.range.end_min),
            block.is_available as i32,
            block.source.as_str(),
            block.sync_generation,
        ],
    )?;
    Ok(())
}

/// Sync path: same natural key from a later sync cycle just moves the row
/// to the new generation instead of duplicating it.
pub fn upsert_google_block(conn: &Connection, block: &AvailabilityBlock) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO availability_blocks (id, cleaner_id, date, start_time, end_time, is_available, source, sync_generation)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, 'google_calendar', ?6)
         ON CONFLICT(cleaner_id, date, start_time, end_time, source)
           DO UPDATE SET sync_generation = excluded.sync_generation",
        params![
            block.id,
            block.cleaner_id,
            block.date.format(DATE_FMT).to_string(),
            format_minutes(block.range.start_min),
            format_minutes(block.range.end_min),
            block.sync_generation,
        ],
    )?;
    Ok(())
}

pub fn delete_stale_google_blocks(
    conn: &Connection,
    cleaner_id: &str,
    current_generation: i64,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM availability_blocks
         WHERE cleaner_id = ?1 AND source = 'google_calendar' AND sync_generation != ?2",
        params![cleaner_id, current_generation],
    )?;
    Ok(count)
}

pub fn max_google_generation(conn: &Connection, cleaner_id: &str) -> anyhow::Result<i64> {
    let generation: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sync_generation), 0) FROM availability_blocks
         WHERE cleaner_id = ?1 AND source = 'google_calendar'",
        params![cleaner_id],
        |row| row.get(0),
    )?;
    Ok(generation)
}

pub fn delete_block(conn: &Connection, cleaner_id: &str, block_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM availability_blocks WHERE id = ?1 AND cleaner_id = ?2",
        params![block_id, cleaner_id],
    )?;
    Ok(count > 0)
}

pub fn blocks_for_date(
    conn: &Connection,
    cleaner_id: &str,
    date: &NaiveDate,
) -> anyhow::Result<Vec<AvailabilityBlock>> {
    let mut stmt = conn.prepare(
        "SELECT id, cleaner_id, date, start_time, end_time, is_available, source, sync_generation
         FROM availability_blocks WHERE cleaner_id = ?1 AND date = ?2
         ORDER BY start_time ASC",
    )?;

    let rows = stmt.query_map(
        params![cleaner_id, date.format(DATE_FMT).to_string()],
        |row| Ok(parse_block_row(row)),
    )?;

    let mut blocks = vec![];
    for row in rows {
        blocks.push(row??);
    }
    Ok(blocks)
}

pub fn count_google_blocks(conn: &Connection, cleaner_id: &str) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM availability_blocks
         WHERE cleaner_id = ?1 AND source = 'google_calendar'",
        params![cleaner_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn parse_block_row(row: &rusqlite::Row) -> anyhow::Result<AvailabilityBlock> {
    let id: String = row.get(0)?;
    let cleaner_id: String = row.get(1)?;
    let date_str: String = row.get(2)?;
    let start_str: String = row.get(3)?;
    let end_str: String = row.get(4)?;
    let is_available: bool = row.get::<_, i32>(5)? != 0;
    let source_str: String = row.get(6)?;
    let sync_generation: i64 = row.get(7)?;

    let date = NaiveDate::parse_from_str(&date_str, DATE_FMT)
        .map_err(|e| anyhow::anyhow!("bad block date {date_str}: {e}"))?;
    let range = TimeRange::new(parse_time(&start_str)?, parse_end_time(&end_str)?)?;

    Ok(AvailabilityBlock {
        id,
        cleaner_id,
        date,
        range,
        is_available,
        source: BlockSource::parse(&source_str),
        sync_generation,
    })
}

// End-of-day blocks are stored as "24:00", which parse_time rejects.
fn parse_end_time(s: &str) -> anyhow::Result<u32> {
    if s == "24:00" {
        return Ok(crate::models::interval::MINUTES_PER_DAY);
    }
    parse_time(s)
}

// ── Bookings ──

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, cleaner_id, owner_id, property_id, status, service, date, time, hours, price, created_by_ai, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            booking.id,
            booking.cleaner_id,
            booking.owner_id,
            booking.property_id,
            booking.status.as_str(),
            booking.service,
            booking.date.format(DATE_FMT).to_string(),
            format_minutes(booking.start_min),
            booking.hours,
            booking.price,
            booking.created_by_ai as i32,
            booking.created_at.format(DATETIME_FMT).to_string(),
            booking.updated_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        "SELECT id, cleaner_id, owner_id, property_id, status, service, date, time, hours, price, created_by_ai, created_at, updated_at
         FROM bookings WHERE id = ?1",
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Pending and confirmed bookings on one date — the set that occupies
/// intervals for conflict purposes.
pub fn active_bookings_on(
    conn: &Connection,
    cleaner_id: &str,
    date: &NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(
        "SELECT id, cleaner_id, owner_id, property_id, status, service, date, time, hours, price, created_by_ai, created_at, updated_at
         FROM bookings
         WHERE cleaner_id = ?1 AND date = ?2 AND status IN ('pending', 'confirmed')
         ORDER BY time ASC",
    )?;

    let rows = stmt.query_map(
        params![cleaner_id, date.format(DATE_FMT).to_string()],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
) -> anyhow::Result<bool> {
    let now = Utc::now().naive_utc().format(DATETIME_FMT).to_string();
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

pub fn get_all_bookings(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            "SELECT id, cleaner_id, owner_id, property_id, status, service, date, time, hours, price, created_by_ai, created_at, updated_at \
             FROM bookings WHERE status = ?1 ORDER BY date DESC, time DESC LIMIT ?2"
                .to_string(),
            vec![
                Box::new(status.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            "SELECT id, cleaner_id, owner_id, property_id, status, service, date, time, hours, price, created_by_ai, created_at, updated_at \
             FROM bookings ORDER BY date DESC, time DESC LIMIT ?1"
                .to_string(),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_dashboard_stats(conn: &Connection) -> anyhow::Result<DashboardStats> {
    let today = Utc::now().naive_utc().date().format(DATE_FMT).to_string();

    let upcoming_confirmed: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM bookings WHERE date >= ?1 AND status = 'confirmed'",
            params![today],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let ai_created: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM bookings WHERE created_by_ai = 1 AND status != 'cancelled'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let cleaner_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM cleaners", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(DashboardStats {
        upcoming_confirmed,
        ai_created,
        cleaner_count,
    })
}

pub struct DashboardStats {
    pub upcoming_confirmed: i64,
    pub ai_created: i64,
    pub cleaner_count: i64,
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let cleaner_id: String = row.get(1)?;
    let owner_id: String = row.get(2)?;
    let property_id: String = row.get(3)?;
    let status_str: String = row.get(4)?;
    let service: String = row.get(5)?;
    let date_str: String = row.get(6)?;
    let time_str: String = row.get(7)?;
    let hours: i64 = row.get(8)?;
    let price: f64 = row.get(9)?;
    let created_by_ai: bool = row.get::<_, i32>(10)? != 0;
    let created_at_str: String = row.get(11)?;
    let updated_at_str: String = row.get(12)?;

    let date = NaiveDate::parse_from_str(&date_str, DATE_FMT)
        .map_err(|e| anyhow::anyhow!("bad booking date {date_str}: {e}"))?;
    let start_min = parse_time(&time_str)?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, DATETIME_FMT)
        .unwrap_or_else(|_| Utc::now().naive_utc());
    let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, DATETIME_FMT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Booking {
        id,
        cleaner_id,
        owner_id,
        property_id,
        status: BookingStatus::parse(&status_str),
        service,
        date,
        start_min,
        hours,
        price,
        created_by_ai,
        created_at,
        updated_at,
    })
}
