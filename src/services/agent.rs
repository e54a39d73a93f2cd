use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::models::{parse_time, AgentCommand, Cleaner, Property, TimeRange};
use crate::services::ai::Message;
use crate::services::availability;
use crate::services::guard::{self, BookingRequest, ConflictReason, GuardError};
use crate::state::AppState;

const DEFAULT_JOB_HOURS: i64 = 2;

const SYSTEM_PROMPT: &str = r#"You are the sales assistant for a villa-cleaning marketplace, chatting with a villa owner on behalf of one cleaner.

Return ONLY valid JSON (no markdown, no explanation) with this exact structure:
{
  "reply": "Your friendly message to the owner",
  "action": null
}

When the owner asks about availability or wants to book, set "action" to one of:
{"command": "check_availability", "date": "2025-07-01", "time": "10:00 or null", "hours": 2}
{"command": "create_booking", "service": "standard_clean|deep_clean|checkout_clean", "date": "2025-07-01", "time": "09:00", "hours": 3, "address": "the villa address or null"}
{"command": "request_handoff", "reason": "why a human should take over"}

Rules:
- Only create_booking once the owner has clearly agreed to a specific date, time and service.
- Never invent an address; pass null if the owner has not given one.
- Dates are YYYY-MM-DD, times are 24h HH:MM.
- For pricing questions, quote hours x the hourly rate from the context.
- Keep replies short and warm."#;

#[derive(Debug, Deserialize)]
struct AgentTurn {
    reply: String,
    action: Option<AgentCommand>,
}

/// Model failures and our own infrastructure failures surface to the
/// caller with different status codes, so they stay distinct here.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("chat model call failed: {0}")]
    Llm(anyhow::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct AgentReply {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
    pub handoff: bool,
}

impl AgentReply {
    fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            booking_id: None,
            handoff: false,
        }
    }
}

/// One turn of the sales conversation: ask the model for a reply plus an
/// optional command, then dispatch the command through the same resolver
/// and guard every human flow uses. The model never touches booking state
/// directly.
pub async fn handle_message(
    state: &AppState,
    cleaner_id: &str,
    owner_id: &str,
    message: &str,
) -> Result<AgentReply, AgentError> {
    let cleaner = {
        let db = state.db.lock().unwrap();
        queries::get_cleaner(&db, cleaner_id)?
    }
    .ok_or_else(|| anyhow::anyhow!("unknown cleaner: {cleaner_id}"))?;

    let context = format!(
        "Cleaner: {} (rate {:.2}/hour). Today is {}.",
        cleaner.name,
        cleaner.hourly_rate,
        Utc::now().naive_utc().date(),
    );
    let system = format!("{SYSTEM_PROMPT}\n\nContext:\n{context}");

    let messages = [Message::user(message)];

    let response = state
        .llm
        .chat(&system, &messages)
        .await
        .map_err(AgentError::Llm)?;
    let turn = parse_agent_turn(&response);

    match turn.action {
        None => Ok(AgentReply::text(turn.reply)),
        Some(command) => Ok(dispatch(state, &cleaner, owner_id, command, turn.reply)?),
    }
}

fn dispatch(
    state: &AppState,
    cleaner: &Cleaner,
    owner_id: &str,
    command: AgentCommand,
    reply: String,
) -> anyhow::Result<AgentReply> {
    match command {
        AgentCommand::CheckAvailability { date, time, hours } => {
            let Ok(date) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") else {
                return Ok(AgentReply::text(
                    "I couldn't make out that date — could you give it as e.g. 2025-07-01?",
                ));
            };

            let intervals = {
                let db = state.db.lock().unwrap();
                availability::cached_unavailable_intervals(
                    &db,
                    &state.availability_cache,
                    &cleaner.id,
                    &date,
                )?
            };

            match time {
                Some(time_str) => {
                    let Ok(start_min) = parse_time(&time_str) else {
                        return Ok(AgentReply::text(
                            "I couldn't make out that time — could you give it as e.g. 14:00?",
                        ));
                    };
                    let range = TimeRange::from_start_and_hours(
                        start_min,
                        hours.unwrap_or(DEFAULT_JOB_HOURS),
                    )?;
                    if intervals.iter().any(|i| i.range.overlaps(&range)) {
                        Ok(AgentReply::text(format!(
                            "{} isn't free {} at {} — taken: {}.",
                            cleaner.name,
                            date,
                            time_str,
                            describe_intervals(&intervals),
                        )))
                    } else {
                        Ok(AgentReply::text(format!(
                            "Good news — {} is free on {} at {}.",
                            cleaner.name, date, time_str,
                        )))
                    }
                }
                None => {
                    if intervals.is_empty() {
                        Ok(AgentReply::text(format!(
                            "{} is completely free on {}.",
                            cleaner.name, date,
                        )))
                    } else {
                        Ok(AgentReply::text(format!(
                            "On {} {} already has: {}.",
                            date,
                            cleaner.name,
                            describe_intervals(&intervals),
                        )))
                    }
                }
            }
        }

        AgentCommand::CreateBooking {
            service,
            date,
            time,
            hours,
            address,
        } => {
            let Ok(date) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") else {
                return Ok(AgentReply::text(
                    "I couldn't make out that date — could you give it as e.g. 2025-07-01?",
                ));
            };
            let Ok(start_min) = parse_time(&time) else {
                return Ok(AgentReply::text(
                    "I couldn't make out that time — could you give it as e.g. 14:00?",
                ));
            };
            if hours <= 0 {
                return Ok(AgentReply::text("How many hours should I book?"));
            }

            let range = TimeRange::from_start_and_hours(start_min, hours)?;

            // First pass through the resolver so the owner hears what is
            // in the way; the guard below remains the authority.
            let conflict = {
                let db = state.db.lock().unwrap();
                let intervals = availability::cached_unavailable_intervals(
                    &db,
                    &state.availability_cache,
                    &cleaner.id,
                    &date,
                )?;
                intervals.iter().find(|i| i.range.overlaps(&range)).cloned()
            };
            if let Some(hit) = conflict {
                return Ok(AgentReply::text(format!(
                    "That slot isn't free: {} is taken ({}). Want me to look for another time?",
                    format_interval(&hit),
                    hit.source.as_str(),
                )));
            }

            let (property, property_created) = {
                let db = state.db.lock().unwrap();
                resolve_or_create_property(&db, owner_id, address.as_deref())?
            };

            let request = BookingRequest {
                cleaner_id: cleaner.id.clone(),
                owner_id: owner_id.to_string(),
                property_id: property.id.clone(),
                service,
                date,
                start_min,
                hours,
                price: cleaner.hourly_rate * hours as f64,
                created_by_ai: true,
                // agent bookings skip pending: the availability check in
                // this same call stands in for cleaner acceptance
                confirmed: true,
            };

            let result = {
                let mut db = state.db.lock().unwrap();
                guard::try_create_booking(&mut db, &state.availability_cache, &request)
            };

            match result {
                Ok(booking) => {
                    let mut message = format!(
                        "Booked! {} on {} at {} for {}h ({:.2}).",
                        booking.service,
                        booking.date,
                        booking.time_range().start_str(),
                        booking.hours,
                        booking.price,
                    );
                    if property_created {
                        message.push_str(&format!(
                            " I've set the villa up at \"{}\" with 3 bedrooms and 2 bathrooms — let me know if that's off.",
                            property.address,
                        ));
                    }
                    Ok(AgentReply {
                        message,
                        booking_id: Some(booking.id),
                        handoff: false,
                    })
                }
                // Lost the race between the check above and the guard.
                Err(GuardError::Conflict(
                    ConflictReason::AlreadyBooked | ConflictReason::Blocked,
                )) => Ok(AgentReply::text(
                    "So sorry — that slot was taken just now. Shall I check the next free time?",
                )),
                Err(GuardError::Conflict(ConflictReason::PastDate)) => Ok(AgentReply::text(
                    "That date has already passed — which day did you mean?",
                )),
                Err(GuardError::Database(e)) => Err(e),
            }
        }

        AgentCommand::RequestHandoff { reason } => {
            tracing::info!(cleaner_id = %cleaner.id, reason = %reason, "agent requested handoff");
            Ok(AgentReply {
                message: reply,
                booking_id: None,
                handoff: true,
            })
        }
    }
}

fn parse_agent_turn(response: &str) -> AgentTurn {
    if let Ok(turn) = serde_json::from_str::<AgentTurn>(response) {
        return turn;
    }

    // Strip markdown code fences
    let cleaned = response
        .trim()
        .strip_prefix("```json")
        .or_else(|| response.trim().strip_prefix("```"))
        .unwrap_or(response.trim());
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Ok(turn) = serde_json::from_str::<AgentTurn>(cleaned) {
        return turn;
    }

    if let Some(start) = cleaned.find('{') {
        if let Some(end) = cleaned.rfind('}') {
            if let Ok(turn) = serde_json::from_str::<AgentTurn>(&cleaned[start..=end]) {
                return turn;
            }
        }
    }

    // Fallback: treat the whole response as a plain reply
    tracing::warn!("failed to parse LLM response as agent turn, using raw text");
    AgentTurn {
        reply: response.to_string(),
        action: None,
    }
}

/// Fuzzy match on normalized addresses; a miss creates a placeholder villa
/// with default room counts. The caller tells the owner when that happens.
fn resolve_or_create_property(
    conn: &Connection,
    owner_id: &str,
    address: Option<&str>,
) -> anyhow::Result<(Property, bool)> {
    let existing = queries::list_properties_for_owner(conn, owner_id)?;

    if let Some(addr) = address {
        let needle = normalize_address(addr);
        if !needle.is_empty() {
            if let Some(hit) = existing.iter().find(|p| {
                let hay = normalize_address(&p.address);
                hay.contains(&needle) || needle.contains(&hay)
            }) {
                return Ok((hit.clone(), false));
            }
        }
    } else if existing.len() == 1 {
        return Ok((existing[0].clone(), false));
    }

    let property = Property {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        address: address.unwrap_or("(address pending)").to_string(),
        bedrooms: 3,
        bathrooms: 2,
        is_placeholder: true,
    };
    queries::create_property(conn, &property)?;

    Ok((property, true))
}

fn normalize_address(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe_intervals(intervals: &[availability::UnavailableInterval]) -> String {
    intervals
        .iter()
        .map(format_interval)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_interval(interval: &availability::UnavailableInterval) -> String {
    format!(
        "{}-{}",
        interval.range.start_str(),
        interval.range.end_str()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_parse_turn_plain_json() {
        let turn = parse_agent_turn(
            r#"{"reply":"Sure!","action":{"command":"check_availability","date":"2031-06-01","time":null,"hours":null}}"#,
        );
        assert_eq!(turn.reply, "Sure!");
        assert!(matches!(
            turn.action,
            Some(AgentCommand::CheckAvailability { .. })
        ));
    }

    #[test]
    fn test_parse_turn_fenced() {
        let raw = "```json\n{\"reply\":\"Done\",\"action\":null}\n```";
        let turn = parse_agent_turn(raw);
        assert_eq!(turn.reply, "Done");
        assert!(turn.action.is_none());
    }

    #[test]
    fn test_parse_turn_fallback_raw_text() {
        let turn = parse_agent_turn("happy to help with anything else!");
        assert_eq!(turn.reply, "happy to help with anything else!");
        assert!(turn.action.is_none());
    }

    #[test]
    fn test_parse_turn_rejects_unknown_command() {
        // unknown command must not parse into an action
        let turn = parse_agent_turn(r#"{"reply":"ok","action":{"command":"delete_everything"}}"#);
        assert!(turn.action.is_none());
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("Villa Azul, Calle 5!"), "villa azul calle 5");
        assert_eq!(normalize_address("  VILLA   AZUL "), "villa azul");
    }

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        conn.execute_batch(
            "INSERT INTO owners (id, name) VALUES ('o1', 'Jan');
             INSERT INTO properties (id, owner_id, address) VALUES ('p1', 'o1', 'Villa Azul, Calle 5, Ibiza');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_resolve_property_fuzzy_match() {
        let conn = setup_db();
        let (property, created) =
            resolve_or_create_property(&conn, "o1", Some("villa azul calle 5")).unwrap();
        assert_eq!(property.id, "p1");
        assert!(!created);
    }

    #[test]
    fn test_resolve_property_single_fallback_without_address() {
        let conn = setup_db();
        let (property, created) = resolve_or_create_property(&conn, "o1", None).unwrap();
        assert_eq!(property.id, "p1");
        assert!(!created);
    }

    #[test]
    fn test_resolve_property_creates_placeholder() {
        let conn = setup_db();
        let (property, created) =
            resolve_or_create_property(&conn, "o1", Some("Casa Nueva, Mallorca")).unwrap();
        assert!(created);
        assert!(property.is_placeholder);
        assert_eq!(property.bedrooms, 3);
        assert_eq!(property.bathrooms, 2);
        assert_eq!(
            queries::list_properties_for_owner(&conn, "o1").unwrap().len(),
            2
        );
    }
}
