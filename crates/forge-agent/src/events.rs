//! Events published on the event broker.

use crate::model::{AgentMessage, FinishReason};
use crate::permission::PermissionRequest;
use serde::{Deserialize, Serialize};

/// The three verbs used by `MessageService::Subscribe` and
/// `SessionService::Subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Progress phases emitted by `Summarize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummarizeProgress {
    Starting,
    Analyzing,
    Generating,
    Done,
}

/// One agent-facing event. `AgentEventKind` is closed (not open-ended) so a
/// bridge consuming it can match exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEventKind {
    /// A tool call began executing.
    ToolCallStart {
        tool_call_id: String,
        tool_name: String,
        arguments: String,
    },
    /// A tool call finished; the tool message is rewritten with the union of
    /// known results each time a worker completes.
    ToolCallEnd {
        tool_call_id: String,
        tool_name: String,
        is_error: bool,
        result: String,
    },
    /// The tool list's content hash changed since the last turn; re-sent
    /// only when it changes (transition_before_llm_call's dedup rule).
    ToolsAvailable { tools_hash: String },
    AssistantContentDelta { session_id: String, delta: String },
    AssistantThinkingDelta { session_id: String, delta: String },
    /// Terminal event for one turn: `AgentEvent{type=response, done=true}`.
    Response {
        session_id: String,
        message: AgentMessage,
        done: bool,
    },
    /// `AgentEvent{type=error, ...}`; covers `RequestCancelled` and
    /// `ProviderError` surfacing.
    Error {
        session_id: String,
        error: String,
        finish_reason: Option<FinishReason>,
    },
    Summarize {
        session_id: String,
        progress: SummarizeProgress,
        message: Option<String>,
    },
    PermissionRequested { request: PermissionRequest },
    PermissionResolved { request_id: String, granted: bool },
    Message {
        session_id: String,
        kind: ChangeKind,
        message_id: String,
    },
    Session { session_id: String, kind: ChangeKind },
}

/// One event as delivered to a subscriber: a monotonic sequence number, the
/// originating session (if any), a wall-clock timestamp, and the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    pub seq: u64,
    pub session_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: time::OffsetDateTime,
    pub kind: AgentEventKind,
}
