use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moka::sync::Cache;

use crate::services::availability::UnavailableInterval;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AvailabilityKey {
    cleaner_id: String,
    date: NaiveDate,
}

/// TTL cache over resolved per-date schedules. Purely an optimization:
/// the conflict guard always re-reads inside its own transaction, so a
/// stale entry here can never cause a double-booking. Every write path
/// (guard insert, lifecycle transition, calendar sync) invalidates.
#[derive(Clone)]
pub struct AvailabilityCache {
    inner: Cache<AvailabilityKey, Arc<Vec<UnavailableInterval>>>,
}

impl AvailabilityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .support_invalidation_closures()
                .build(),
        }
    }

    pub fn get(&self, cleaner_id: &str, date: NaiveDate) -> Option<Arc<Vec<UnavailableInterval>>> {
        self.inner.get(&AvailabilityKey {
            cleaner_id: cleaner_id.to_string(),
            date,
        })
    }

    pub fn insert(&self, cleaner_id: &str, date: NaiveDate, intervals: Arc<Vec<UnavailableInterval>>) {
        self.inner.insert(
            AvailabilityKey {
                cleaner_id: cleaner_id.to_string(),
                date,
            },
            intervals,
        );
    }

    pub fn invalidate_date(&self, cleaner_id: &str, date: NaiveDate) {
        self.inner.invalidate(&AvailabilityKey {
            cleaner_id: cleaner_id.to_string(),
            date,
        });
    }

    /// Calendar sync touches an unbounded set of dates; drop everything
    /// for the cleaner.
    pub fn invalidate_cleaner(&self, cleaner_id: &str) {
        let cleaner_id = cleaner_id.to_string();
        if let Err(e) = self
            .inner
            .invalidate_entries_if(move |key, _| key.cleaner_id == cleaner_id)
        {
            tracing::warn!(error = %e, "failed to invalidate availability cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockSource, TimeRange};

    fn interval(start: u32, end: u32) -> UnavailableInterval {
        UnavailableInterval {
            range: TimeRange::new(start, end).unwrap(),
            source: BlockSource::Manual,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_insert_get_invalidate() {
        let cache = AvailabilityCache::new(Duration::from_secs(60));
        let d = date("2031-06-01");

        assert!(cache.get("c1", d).is_none());
        cache.insert("c1", d, Arc::new(vec![interval(540, 600)]));
        assert_eq!(cache.get("c1", d).unwrap().len(), 1);

        cache.invalidate_date("c1", d);
        assert!(cache.get("c1", d).is_none());
    }

    #[test]
    fn test_invalidate_cleaner_scoped() {
        let cache = AvailabilityCache::new(Duration::from_secs(60));
        let d = date("2031-06-01");

        cache.insert("c1", d, Arc::new(vec![]));
        cache.insert("c2", d, Arc::new(vec![]));
        cache.invalidate_cleaner("c1");
        // invalidation closures apply eagerly on read
        assert!(cache.get("c1", d).is_none());
        assert!(cache.get("c2", d).is_some());
    }
}
