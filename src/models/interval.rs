use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Half-open interval within one calendar day, in minutes since midnight.
/// `[start_min, end_min)` — an interval ending exactly when another starts
/// does not overlap it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_min: u32,
    pub end_min: u32,
}

impl TimeRange {
    pub fn new(start_min: u32, end_min: u32) -> anyhow::Result<Self> {
        if end_min <= start_min {
            anyhow::bail!("interval end must be after start");
        }
        if end_min > MINUTES_PER_DAY {
            anyhow::bail!("interval extends past end of day");
        }
        Ok(Self { start_min, end_min })
    }

    pub fn from_strs(start: &str, end: &str) -> anyhow::Result<Self> {
        Self::new(parse_time(start)?, parse_time(end)?)
    }

    /// Booking-style interval: start plus a whole number of hours, clamped
    /// to end of day.
    pub fn from_start_and_hours(start_min: u32, hours: i64) -> anyhow::Result<Self> {
        if hours <= 0 {
            anyhow::bail!("duration must be at least one hour");
        }
        let end = (start_min as i64 + hours * 60).min(MINUTES_PER_DAY as i64) as u32;
        Self::new(start_min, end)
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start_min < other.end_min && other.start_min < self.end_min
    }

    pub fn start_str(&self) -> String {
        format_minutes(self.start_min)
    }

    pub fn end_str(&self) -> String {
        format_minutes(self.end_min)
    }
}

pub fn parse_time(s: &str) -> anyhow::Result<u32> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        anyhow::bail!("invalid time format: {s}");
    }
    let hour: u32 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u32 = parts[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    if hour > 23 || minute > 59 {
        anyhow::bail!("time out of range: {s}");
    }
    Ok(hour * 60 + minute)
}

pub fn format_minutes(m: u32) -> String {
    format!("{:02}:{:02}", m / 60, m % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: &str, end: &str) -> TimeRange {
        TimeRange::from_strs(start, end).unwrap()
    }

    #[test]
    fn test_parse_time_valid() {
        assert_eq!(parse_time("09:00").unwrap(), 540);
        assert_eq!(parse_time("23:59").unwrap(), 1439);
        assert_eq!(parse_time("00:00").unwrap(), 0);
    }

    #[test]
    fn test_parse_time_invalid() {
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("09:60").is_err());
        assert!(parse_time("9am").is_err());
        assert!(parse_time("").is_err());
    }

    #[test]
    fn test_new_rejects_inverted() {
        assert!(TimeRange::new(600, 600).is_err());
        assert!(TimeRange::new(600, 540).is_err());
    }

    #[test]
    fn test_overlap_contained() {
        // requested inside existing
        assert!(range("10:00", "11:00").overlaps(&range("09:00", "13:00")));
        // existing inside requested
        assert!(range("09:00", "13:00").overlaps(&range("10:00", "11:00")));
    }

    #[test]
    fn test_overlap_partial() {
        // starts inside
        assert!(range("10:30", "11:30").overlaps(&range("10:00", "11:00")));
        // ends inside
        assert!(range("09:30", "10:30").overlaps(&range("10:00", "11:00")));
    }

    #[test]
    fn test_boundary_touch_is_not_overlap() {
        assert!(!range("09:00", "10:00").overlaps(&range("10:00", "11:00")));
        assert!(!range("10:00", "11:00").overlaps(&range("09:00", "10:00")));
    }

    #[test]
    fn test_one_minute_overlap() {
        assert!(range("09:00", "10:01").overlaps(&range("10:00", "11:00")));
    }

    #[test]
    fn test_from_start_and_hours_clamps_to_midnight() {
        let r = TimeRange::from_start_and_hours(parse_time("23:00").unwrap(), 3).unwrap();
        assert_eq!(r.end_min, MINUTES_PER_DAY);
        assert_eq!(r.end_str(), "24:00");
    }

    #[test]
    fn test_from_start_and_hours_rejects_zero() {
        assert!(TimeRange::from_start_and_hours(540, 0).is_err());
    }

    #[test]
    fn test_randomized_overlap_symmetry() {
        // overlap must be symmetric and match the four-case definition
        let mut seed: u64 = 0x9e3779b97f4a7c15;
        for _ in 0..500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let a_start = (seed >> 33) as u32 % 1380;
            let a_end = a_start + 1 + (seed as u32 % 60);
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let b_start = (seed >> 33) as u32 % 1380;
            let b_end = b_start + 1 + (seed as u32 % 60);

            let a = TimeRange::new(a_start, a_end.min(MINUTES_PER_DAY)).unwrap();
            let b = TimeRange::new(b_start, b_end.min(MINUTES_PER_DAY)).unwrap();

            assert_eq!(a.overlaps(&b), b.overlaps(&a));
            let expected = a_start.max(b_start) < a.end_min.min(b.end_min);
            assert_eq!(a.overlaps(&b), expected);
        }
    }
}
