//! Shared in-memory harness for the scenario/invariant integration tests:
//! a scripted, non-streaming `ChatProvider` for turn-by-turn control, a
//! delayed-chunk streaming provider for cancellation tests, and a thin
//! `AgentCore` builder wired to the in-memory session/message services.

use async_trait::async_trait;
use forge_agent::config::{Config, ModelSelection, Options};
use forge_agent::event_bus::EventBus;
use forge_agent::permission::PermissionBroker;
use forge_agent::session::memory::{InMemoryMessageService, InMemorySessionService};
use forge_agent::tools::registry::ToolRegistry;
use forge_agent::{AgentCore, AgentEvent, AgentEventKind, ModelSlot};
use forge_provider::{
    ChatMessage, ChatProvider, ChatResponse, ChatStream, FinishReason as ProviderFinishReason,
    FunctionCall, LLMError, ModelInfo, StreamChunk, Tool, ToolCall, Usage,
};
use futures::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

/// Always returns an empty, default response. Used as the small-model slot
/// in tests that don't care about summarization/title generation.
pub struct NullProvider;

#[async_trait]
impl ChatProvider for NullProvider {
    async fn chat_with_tools(
        &self,
        _history: &[ChatMessage],
        _tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, LLMError> {
        Ok(ChatResponse::default())
    }
}

/// Returns one canned `ChatResponse` per call, in order, over the
/// non-streaming path — enough to script a multi-turn tool-use loop.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ChatResponse>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn chat_with_tools(
        &self,
        _history: &[ChatMessage],
        _tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, LLMError> {
        Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
    }
}

pub fn text_response(text: &str, finish_reason: ProviderFinishReason, usage: Usage) -> ChatResponse {
    ChatResponse {
        text: Some(text.to_string()),
        thinking: None,
        tool_calls: Vec::new(),
        finish_reason,
        usage,
    }
}

pub fn tool_call_response(call_id: &str, tool_name: &str, arguments_json: &str) -> ChatResponse {
    ChatResponse {
        text: None,
        thinking: None,
        tool_calls: vec![ToolCall {
            id: call_id.into(),
            function: FunctionCall {
                name: tool_name.into(),
                arguments: arguments_json.into(),
            },
        }],
        finish_reason: ProviderFinishReason::ToolCalls,
        usage: Usage::default(),
    }
}

/// Like `ScriptedProvider`, but also remembers the last `history` it was
/// called with — lets a test inspect exactly what was sent upstream (e.g.
/// to check a summary anchor's role was rewritten before transmission).
pub struct RecordingProvider {
    responses: Mutex<VecDeque<ChatResponse>>,
    pub last_history: Mutex<Option<Vec<ChatMessage>>>,
}

impl RecordingProvider {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            last_history: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ChatProvider for RecordingProvider {
    async fn chat_with_tools(
        &self,
        history: &[ChatMessage],
        _tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, LLMError> {
        *self.last_history.lock().unwrap() = Some(history.to_vec());
        Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// Streams a fixed sequence of chunks, each delayed by the given number of
/// milliseconds before it's yielded — enough of a gap for a test to
/// observe the first chunk's side effect and fire a cancellation before
/// the next one arrives.
pub struct StreamingProvider {
    chunks: Mutex<Option<Vec<(u64, StreamChunk)>>>,
}

impl StreamingProvider {
    pub fn new(chunks: Vec<(u64, StreamChunk)>) -> Self {
        Self {
            chunks: Mutex::new(Some(chunks)),
        }
    }
}

#[async_trait]
impl ChatProvider for StreamingProvider {
    fn supports_streaming(&self) -> bool {
        true
    }

    async fn chat_with_tools(
        &self,
        _history: &[ChatMessage],
        _tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, LLMError> {
        Ok(ChatResponse::default())
    }

    async fn chat_stream_with_tools(
        &self,
        _history: &[ChatMessage],
        _tools: Option<&[Tool]>,
    ) -> Result<ChatStream, LLMError> {
        let chunks = self.chunks.lock().unwrap().take().unwrap_or_default();
        let stream = stream::unfold(chunks.into_iter(), |mut remaining| async move {
            let (delay_ms, chunk) = remaining.next()?;
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Some((Ok(chunk), remaining))
        });
        Ok(Box::pin(stream))
    }
}

/// Builds an `AgentCore` with in-memory session/message services, an empty
/// permission broker/event bus pair, and the given main provider + tool
/// registry. The small-model slot is always a `NullProvider`.
pub fn build_core(main_provider: Arc<dyn ChatProvider>, registry: ToolRegistry) -> Arc<AgentCore> {
    build_core_with_model(main_provider, registry, ModelInfo::default())
}

pub fn build_core_with_model(
    main_provider: Arc<dyn ChatProvider>,
    registry: ToolRegistry,
    model_info: ModelInfo,
) -> Arc<AgentCore> {
    build_core_full(main_provider, registry, model_info, Options::default())
}

pub fn build_core_full(
    main_provider: Arc<dyn ChatProvider>,
    registry: ToolRegistry,
    model_info: ModelInfo,
    options: Options,
) -> Arc<AgentCore> {
    let event_bus = Arc::new(EventBus::new());
    let permission_broker = Arc::new(PermissionBroker::new(event_bus.clone()));

    let main = ModelSlot {
        provider: main_provider,
        info: model_info,
        provider_id: "test".into(),
        model_id: "main".into(),
    };
    let small = ModelSlot {
        provider: Arc::new(NullProvider),
        info: ModelInfo::default(),
        provider_id: "test".into(),
        model_id: "small".into(),
    };

    let config = Config {
        large_model: ModelSelection {
            provider_id: "test".into(),
            model_id: "main".into(),
        },
        small_model: ModelSelection {
            provider_id: "test".into(),
            model_id: "small".into(),
        },
        providers: HashMap::new(),
        options,
    };

    Arc::new(AgentCore::new(
        event_bus,
        permission_broker,
        Arc::new(InMemorySessionService::new()),
        Arc::new(InMemoryMessageService::new()),
        Arc::new(registry),
        config,
        main,
        small,
    ))
}

/// Drains a subscription until a terminal `Response{done: true}` or `Error`
/// event arrives, returning every event observed along the way (in order).
/// Times out rather than hanging forever if the turn never finalizes.
pub async fn collect_until_done(
    mut events: tokio::sync::broadcast::Receiver<AgentEvent>,
) -> Vec<AgentEvent> {
    let mut seen = Vec::new();
    loop {
        let next = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for a terminal event")
            .expect("event bus closed before a terminal event arrived");
        let terminal = matches!(
            next.kind,
            AgentEventKind::Response { done: true, .. } | AgentEventKind::Error { .. }
        );
        seen.push(next);
        if terminal {
            break;
        }
    }
    seen
}
