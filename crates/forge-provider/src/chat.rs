//! Abstract LLM provider contract: message parts and the streaming client.
//!
//! This module deliberately stops at the trait boundary: no concrete provider
//! wire protocol lives here, only the shapes an `Agent Core` drives against.

use async_trait::async_trait;
use futures::stream::BoxStream;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::LLMError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMime {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageMime {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Png => "image/png",
            ImageMime::Gif => "image/gif",
            ImageMime::Webp => "image/webp",
        }
    }
}

/// A single already-parsed tool invocation, as carried on a completed
/// assistant message (contrast with the streaming `ToolUseStart`/`ToolUseDelta`
/// events below, which assemble one of these incrementally).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON arguments, as accumulated from `ToolUseDelta` fragments.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageType {
    Text,
    Image((ImageMime, Vec<u8>)),
    ImageURL(String),
    ToolUse(Vec<ToolCall>),
    ToolResult(Vec<ToolResultPayload>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPayload {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub message_type: MessageType,
    pub content: String,
}

pub struct ChatMessageBuilder {
    role: ChatRole,
    message_type: MessageType,
    content: String,
}

impl ChatMessageBuilder {
    pub fn user() -> Self {
        Self {
            role: ChatRole::User,
            message_type: MessageType::Text,
            content: String::new(),
        }
    }

    pub fn assistant() -> Self {
        Self {
            role: ChatRole::Assistant,
            message_type: MessageType::Text,
            content: String::new(),
        }
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn tool_use(mut self, calls: Vec<ToolCall>) -> Self {
        self.message_type = MessageType::ToolUse(calls);
        self
    }

    pub fn tool_result(mut self, results: Vec<ToolResultPayload>) -> Self {
        self.role = ChatRole::Tool;
        self.message_type = MessageType::ToolResult(results);
        self
    }

    pub fn build(self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            message_type: self.message_type,
            content: self.content,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

/// JSON-schema parameter description for a tool, mirroring the subset of
/// JSON Schema providers accept for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ParameterProperty {
    #[serde(rename = "type")]
    pub property_type: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterProperty>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_list: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ParametersSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, ParameterProperty>,
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FunctionTool {
    pub name: String,
    pub description: String,
    pub parameters: ParametersSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionTool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolChoice {
    Any,
    Auto,
    Tool(String),
    None,
}

impl Default for ToolChoice {
    fn default() -> Self {
        ToolChoice::Auto
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
    Other,
    Unknown,
}

/// Map a provider finish reason to the terminal `finish` part reason in
/// the message data model: everything but `ToolCalls` collapses to
/// `end_turn`, which the agent core further refines into `canceled` /
/// `permission_denied` / `error` as the turn unwinds.
impl FinishReason {
    pub fn is_tool_use(&self) -> bool {
        matches!(self, FinishReason::ToolCalls)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl Usage {
    /// Field-wise max merge: providers split usage totals across multiple
    /// stream events (e.g. an early event carries input tokens, a later one
    /// carries output tokens), so later reports never retract an earlier one.
    pub fn merge_max(&mut self, other: &Usage) {
        self.input_tokens = self.input_tokens.max(other.input_tokens);
        self.output_tokens = self.output_tokens.max(other.output_tokens);
        self.cache_creation_tokens = self.cache_creation_tokens.max(other.cache_creation_tokens);
        self.cache_read_tokens = self.cache_read_tokens.max(other.cache_read_tokens);
    }
}

/// Final, assembled provider response carried by `StreamChunk::Complete` and
/// returned by the non-streaming `ChatProvider::chat_with_tools` path.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub text: Option<String>,
    pub thinking: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl Default for FinishReason {
    fn default() -> Self {
        FinishReason::Unknown
    }
}

/// One streamed delta from a provider.
///
/// Ordering contract: for any tool-call ID, `ToolUseStart` precedes all its
/// `ToolUseDelta`s, which precede its `ToolUseStop`. `ContentDelta` and
/// `ToolUseStart` may interleave in arrival order. Any in-progress reasoning
/// must be closed (a non-`ThinkingDelta`/`SignatureDelta` event arrives)
/// before the first `ContentDelta` or `ToolUseStart` — the "FinishThinking"
/// rule — so downstream consumers know reasoning has ended.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    ThinkingDelta(String),
    SignatureDelta(String),
    ContentDelta(String),
    ToolUseStart { id: String, name: String },
    ToolUseDelta { id: String, input_fragment: String },
    ToolUseStop { id: String },
    Error(String),
    Complete { response: ChatResponse },
}

pub type ChatStream = BoxStream<'static, Result<StreamChunk, LLMError>>;

/// Contract implemented once per concrete LLM backend. The engine builds two
/// instances per agent: a *main* client bound to the user-selected large
/// model, and a *small* client for titles/summaries.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn supports_streaming(&self) -> bool {
        false
    }

    async fn chat(&self, history: &[ChatMessage]) -> Result<ChatResponse, LLMError> {
        self.chat_with_tools(history, None).await
    }

    async fn chat_with_tools(
        &self,
        history: &[ChatMessage],
        tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, LLMError>;

    async fn chat_stream(&self, history: &[ChatMessage]) -> Result<ChatStream, LLMError> {
        self.chat_stream_with_tools(history, None).await
    }

    /// `StreamResponse(ctx, history, tools)`: a lazy sequence of
    /// `StreamChunk`. Cancellation is the caller dropping the stream (or the
    /// engine's cancellation token firing, which the state machine checks
    /// between polls) rather than an explicit `close()` call.
    async fn chat_stream_with_tools(
        &self,
        _history: &[ChatMessage],
        _tools: Option<&[Tool]>,
    ) -> Result<ChatStream, LLMError> {
        Err(LLMError::NotImplemented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_merge_max_is_field_wise() {
        let mut a = Usage {
            input_tokens: 10,
            output_tokens: 0,
            cache_creation_tokens: 0,
            cache_read_tokens: 0,
        };
        let b = Usage {
            input_tokens: 0,
            output_tokens: 5,
            cache_creation_tokens: 0,
            cache_read_tokens: 0,
        };
        a.merge_max(&b);
        assert_eq!(a.input_tokens, 10);
        assert_eq!(a.output_tokens, 5);
    }

    #[test]
    fn default_finish_reason_is_unknown() {
        assert_eq!(FinishReason::default(), FinishReason::Unknown);
    }
}
