use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::interval::TimeRange;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockSource {
    GoogleCalendar,
    Manual,
    Booking,
}

impl BlockSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockSource::GoogleCalendar => "google_calendar",
            BlockSource::Manual => "manual",
            BlockSource::Booking => "booking",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "google_calendar" => BlockSource::GoogleCalendar,
            "booking" => BlockSource::Booking,
            _ => BlockSource::Manual,
        }
    }
}

/// One contiguous interval on a cleaner's calendar day. `is_available`
/// false means the interval is blocked off; true marks an explicit
/// manual opening.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityBlock {
    pub id: String,
    pub cleaner_id: String,
    pub date: NaiveDate,
    pub range: TimeRange,
    pub is_available: bool,
    pub source: BlockSource,
    pub sync_generation: i64,
}
