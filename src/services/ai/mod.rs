pub mod groq;
pub mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One turn of the sales conversation as sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat seam for the sales agent. Implementations return the raw model
/// text; both built-in providers request strict JSON output because the
/// agent rejects anything that does not parse into a command.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String>;
}

fn with_system(system_prompt: &str, messages: &[Message]) -> Vec<Message> {
    let mut all = Vec::with_capacity(messages.len() + 1);
    all.push(Message {
        role: "system".to_string(),
        content: system_prompt.to_string(),
    });
    all.extend_from_slice(messages);
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_system_prepends() {
        let turns = with_system("be brief", &[Message::user("is Friday free?")]);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "system");
        assert_eq!(turns[1].role, "user");
        assert_eq!(turns[1].content, "is Friday free?");
    }
}
