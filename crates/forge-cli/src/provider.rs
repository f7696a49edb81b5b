//! A minimal OpenAI-compatible `ChatProvider`, wiring `forge-agent`'s
//! abstract provider contract to a concrete HTTP backend. Wire-level
//! provider encoding is explicitly out of the engine's scope; this is
//! the thin adapter a terminal front end supplies.

use async_trait::async_trait;
use forge_provider::{
    ChatMessage, ChatProvider, ChatResponse, FinishReason, LLMError, MessageType, Tool, Usage,
};
use serde::{Deserialize, Serialize};

pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Tool]>,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct Response {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

fn to_wire(history: &[ChatMessage]) -> Vec<WireMessage> {
    history
        .iter()
        .map(|m| WireMessage {
            role: match m.role {
                forge_provider::ChatRole::User => "user",
                forge_provider::ChatRole::Assistant => "assistant",
                forge_provider::ChatRole::System => "system",
                forge_provider::ChatRole::Tool => "tool",
            }
            .to_string(),
            content: match &m.message_type {
                MessageType::Text => m.content.clone(),
                _ => m.content.clone(),
            },
        })
        .collect()
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleProvider {
    async fn chat_with_tools(
        &self,
        history: &[ChatMessage],
        tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, LLMError> {
        let request = Request {
            model: &self.model,
            messages: to_wire(history),
            tools,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LLMError::Provider(format!("{status}: {body}")));
        }

        let parsed: Response = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::ResponseFormat {
                message: "no choices in response".into(),
                raw_response: String::new(),
            })?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Unknown,
        };

        Ok(ChatResponse {
            text: Some(choice.message.content),
            thinking: None,
            tool_calls: Vec::new(),
            finish_reason,
            usage: parsed
                .usage
                .map(|u| Usage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                    cache_creation_tokens: 0,
                    cache_read_tokens: 0,
                })
                .unwrap_or_default(),
        })
    }
}
