use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{with_system, LlmProvider, Message};

const CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

// Replies quote prices and availability, so the same owner question
// should keep producing the same command.
const TEMPERATURE: f64 = 0.2;
const MAX_TOKENS: u32 = 400;

pub struct GroqProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl GroqProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": with_system(system_prompt, messages),
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
            // the agent only accepts structured output
            "response_format": { "type": "json_object" },
        });

        let resp = self
            .client
            .post(CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("sales agent chat request to Groq failed")?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("Groq returned {status}: {detail}");
        }

        let completion: ChatCompletion = resp
            .json()
            .await
            .context("Groq response did not match the completions schema")?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("Groq returned no choices"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_schema() {
        let raw = r#"{
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "{\"reply\":\"hi\",\"action\":null}"},
                "finish_reason": "stop"
            }],
            "usage": {"total_tokens": 20}
        }"#;
        let completion: ChatCompletion = serde_json::from_str(raw).unwrap();
        assert_eq!(
            completion.choices[0].message.content,
            "{\"reply\":\"hi\",\"action\":null}"
        );
    }
}
