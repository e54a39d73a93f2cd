use serde::{Deserialize, Serialize};

/// Closed set of actions the sales agent may take. The model's tool output
/// must parse into one of these before it can touch booking state; anything
/// else is rejected upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AgentCommand {
    CheckAvailability {
        date: String,
        time: Option<String>,
        hours: Option<i64>,
    },
    CreateBooking {
        service: String,
        date: String,
        time: String,
        hours: i64,
        address: Option<String>,
    },
    RequestHandoff {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_availability() {
        let json = r#"{"command":"check_availability","date":"2025-07-01","time":"10:00","hours":2}"#;
        let cmd: AgentCommand = serde_json::from_str(json).unwrap();
        assert_eq!(
            cmd,
            AgentCommand::CheckAvailability {
                date: "2025-07-01".to_string(),
                time: Some("10:00".to_string()),
                hours: Some(2),
            }
        );
    }

    #[test]
    fn test_parse_create_booking() {
        let json = r#"{"command":"create_booking","service":"deep_clean","date":"2025-07-01","time":"09:00","hours":3,"address":"Villa Azul, Calle 5"}"#;
        let cmd: AgentCommand = serde_json::from_str(json).unwrap();
        assert!(matches!(cmd, AgentCommand::CreateBooking { hours: 3, .. }));
    }

    #[test]
    fn test_unknown_command_rejected() {
        let json = r#"{"command":"drop_tables"}"#;
        assert!(serde_json::from_str::<AgentCommand>(json).is_err());
    }
}
