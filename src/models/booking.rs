use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::interval::TimeRange;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub cleaner_id: String,
    pub owner_id: String,
    pub property_id: String,
    pub status: BookingStatus,
    pub service: String,
    pub date: NaiveDate,
    pub start_min: u32,
    pub hours: i64,
    pub price: f64,
    pub created_by_ai: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    /// The interval this booking occupies on its date.
    pub fn time_range(&self) -> TimeRange {
        TimeRange::from_start_and_hours(self.start_min, self.hours)
            .unwrap_or(TimeRange {
                start_min: self.start_min,
                end_min: self.start_min + 1,
            })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => BookingStatus::Confirmed,
            "completed" => BookingStatus::Completed,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::Pending,
        }
    }

    /// Active bookings occupy their interval for conflict purposes.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn can_transition_to(&self, to: BookingStatus) -> bool {
        matches!(
            (self, to),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Completed)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    #[test]
    fn test_transition_matrix() {
        for from in ALL {
            for to in ALL {
                let allowed = from.can_transition_to(to);
                let expected = matches!(
                    (from, to),
                    (BookingStatus::Pending, BookingStatus::Confirmed)
                        | (BookingStatus::Pending, BookingStatus::Cancelled)
                        | (BookingStatus::Confirmed, BookingStatus::Completed)
                        | (BookingStatus::Confirmed, BookingStatus::Cancelled)
                );
                assert_eq!(allowed, expected, "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for to in ALL {
            assert!(!BookingStatus::Completed.can_transition_to(to));
            assert!(!BookingStatus::Cancelled.can_transition_to(to));
        }
    }

    #[test]
    fn test_active_statuses() {
        assert!(BookingStatus::Pending.is_active());
        assert!(BookingStatus::Confirmed.is_active());
        assert!(!BookingStatus::Completed.is_active());
        assert!(!BookingStatus::Cancelled.is_active());
    }
}
