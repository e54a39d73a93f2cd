pub mod google;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One busy interval as reported by the provider, RFC 3339 timestamps.
/// Normalization into day-scoped blocks happens in the sync adapter.
#[derive(Debug, Clone)]
pub struct BusyInterval {
    pub start: String,
    pub end: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    /// Token expired or revoked; the cleaner must reconnect.
    #[error("calendar auth failed: {0}")]
    Auth(String),

    #[error("calendar request failed: {0}")]
    Transient(String),
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn fetch_busy(
        &self,
        refresh_token: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, CalendarError>;
}
