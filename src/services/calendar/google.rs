use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use super::{BusyInterval, CalendarError, CalendarProvider};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const FREEBUSY_URL: &str = "https://www.googleapis.com/calendar/v3/freeBusy";

pub struct GoogleCalendarProvider {
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
}

impl GoogleCalendarProvider {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            client: reqwest::Client::new(),
        }
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<String, CalendarError> {
        let resp = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::Transient(format!("token endpoint unreachable: {e}")))?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CalendarError::Transient(format!("bad token response: {e}")))?;

        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED
        {
            // invalid_grant: refresh token expired or revoked
            return Err(CalendarError::Auth(format!(
                "token refresh rejected ({status}): {data}"
            )));
        }
        if !status.is_success() {
            return Err(CalendarError::Transient(format!(
                "token refresh failed ({status}): {data}"
            )));
        }

        data["access_token"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CalendarError::Transient("missing access_token in response".into()))
    }

    async fn query_freebusy(
        &self,
        access_token: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<reqwest::Response, CalendarError> {
        let body = json!({
            "timeMin": time_min.to_rfc3339(),
            "timeMax": time_max.to_rfc3339(),
            "items": [{ "id": "primary" }],
        });

        self.client
            .post(FREEBUSY_URL)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CalendarError::Transient(format!("freebusy unreachable: {e}")))
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    async fn fetch_busy(
        &self,
        refresh_token: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        let access_token = self.exchange_refresh_token(refresh_token).await?;

        let mut resp = self
            .query_freebusy(&access_token, time_min, time_max)
            .await?;

        // Access token can expire between exchange and use; refresh once
        // and retry before giving up.
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            let access_token = self.exchange_refresh_token(refresh_token).await?;
            resp = self
                .query_freebusy(&access_token, time_min, time_max)
                .await?;
            if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
                return Err(CalendarError::Auth("freebusy rejected access token".into()));
            }
        }

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CalendarError::Transient(format!("bad freebusy response: {e}")))?;

        if !status.is_success() {
            return Err(CalendarError::Transient(format!(
                "freebusy failed ({status}): {data}"
            )));
        }

        let busy = data["calendars"]["primary"]["busy"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        Ok(busy
            .iter()
            .filter_map(|entry| {
                let start = entry["start"].as_str()?;
                let end = entry["end"].as_str()?;
                Some(BusyInterval {
                    start: start.to_string(),
                    end: end.to_string(),
                })
            })
            .collect())
    }
}
