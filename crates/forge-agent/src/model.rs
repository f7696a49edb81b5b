//! The message/session data model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

use forge_provider::ChatRole;

/// One `finish` reason. `#[serde(other)]` degrades an unrecognized incoming
/// tag to `Other` rather than failing to parse, so older clients stay
/// forward-compatible with new reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    EndTurn,
    ToolUse,
    Canceled,
    PermissionDenied,
    Error,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finish {
    pub reason: FinishReason,
    pub message: String,
    pub detail: String,
    pub timestamp: i64,
}

/// A tagged union over message content. Serialization preserves the `type`
/// discriminator so consumers can dispatch on it without decoding the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MessagePart {
    Text { content: String },
    Reasoning {
        content: String,
        signature: Option<String>,
    },
    Binary {
        path: String,
        mime_type: String,
        #[serde(with = "base64_bytes")]
        bytes: Vec<u8>,
    },
    /// Assembled incrementally: `input` accumulates `ToolUseDelta` fragments
    /// in order; `finished` transitions false→true exactly once, when
    /// `ToolUseStop` fires for this call.
    ToolCall {
        id: String,
        name: String,
        input: String,
        finished: bool,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
        metadata: Option<HashMap<String, serde_json::Value>>,
        is_error: bool,
    },
    Finish(Finish),
}

mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        use base64::Engine;
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        use base64::Engine;
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}

impl MessagePart {
    pub fn type_name(&self) -> &'static str {
        match self {
            MessagePart::Text { .. } => "text",
            MessagePart::Reasoning { .. } => "reasoning",
            MessagePart::Binary { .. } => "binary",
            MessagePart::ToolCall { .. } => "tool_call",
            MessagePart::ToolResult { .. } => "tool_result",
            MessagePart::Finish(_) => "finish",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
    System,
}

impl From<MessageRole> for ChatRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => ChatRole::User,
            MessageRole::Assistant => ChatRole::Assistant,
            MessageRole::Tool => ChatRole::Tool,
            MessageRole::System => ChatRole::System,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub parts: Vec<MessagePart>,
    pub model_id: Option<String>,
    pub provider_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub finish: Option<Finish>,
}

impl AgentMessage {
    pub fn new(id: String, session_id: String, role: MessageRole) -> Self {
        Self {
            id,
            session_id,
            role,
            parts: Vec::new(),
            model_id: None,
            provider_id: None,
            created_at: OffsetDateTime::now_utc(),
            finish: None,
        }
    }

    /// Every tool_call id present in this message's parts, in order — the
    /// following tool message must carry exactly one `tool_result` per
    /// entry here.
    pub fn tool_call_ids(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::ToolCall { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Session metadata. Mutated only by the agent core: token/cost
/// accounting, title, and the summary anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: Option<String>,
    pub parent_id: Option<String>,
    pub summary_message_id: Option<String>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Session {
    pub fn new(id: String, title: Option<String>, parent_id: Option<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            title,
            parent_id,
            summary_message_id: None,
            prompt_tokens: 0,
            completion_tokens: 0,
            cost_usd: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}
