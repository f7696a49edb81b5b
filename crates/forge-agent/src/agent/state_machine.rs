//! The turn algorithm: one call to `Run` plus the inner tool-use loop,
//! driven to completion or to a terminal `finish` reason.

use crate::agent::core::{AgentCore, SessionRuntime};
use crate::agent::tool_worker::{ToolOutcome, run_tool_calls};
use crate::error::{AgentError, AgentResult};
use crate::events::AgentEventKind;
use crate::model::{AgentMessage, Finish, FinishReason, MessagePart, MessageRole};
use forge_provider::{
    ChatMessage, ChatMessageBuilder, ChatRole, FinishReason as ProviderFinishReason, MessageType,
    StreamChunk, ToolResultPayload,
};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

const AUTO_COMPACT_RATIO: f64 = 0.95;

/// Converts the engine's persisted `AgentMessage` history into the flat
/// `ChatMessage` shape the Provider Client contract speaks.
fn to_chat_message(message: &AgentMessage) -> ChatMessage {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut tool_results = Vec::new();

    for part in &message.parts {
        match part {
            MessagePart::Text { content } => text.push_str(content),
            MessagePart::ToolCall {
                id, name, input, ..
            } => tool_calls.push(forge_provider::ToolCall {
                id: id.clone(),
                function: forge_provider::FunctionCall {
                    name: name.clone(),
                    arguments: input.clone(),
                },
            }),
            MessagePart::ToolResult {
                tool_call_id,
                content,
                is_error,
                ..
            } => tool_results.push(ToolResultPayload {
                call_id: tool_call_id.clone(),
                content: content.clone(),
                is_error: *is_error,
            }),
            _ => {}
        }
    }

    let role: ChatRole = message.role.into();
    if !tool_results.is_empty() {
        return ChatMessageBuilder::user().tool_result(tool_results).build();
    }
    if !tool_calls.is_empty() {
        return ChatMessage {
            role,
            message_type: MessageType::ToolUse(tool_calls),
            content: text,
        };
    }
    ChatMessage {
        role,
        message_type: MessageType::Text,
        content: text,
    }
}

fn map_finish_reason(reason: ProviderFinishReason) -> FinishReason {
    match reason {
        ProviderFinishReason::ToolCalls => FinishReason::ToolUse,
        _ => FinishReason::EndTurn,
    }
}

/// Run one turn to completion. Spawned as a detached task by `AgentCore::run`;
/// all externally visible effects happen via `event_bus.publish` and the
/// message/session services.
pub(crate) async fn execute_turn(
    core: Arc<AgentCore>,
    session_id: String,
    runtime: Arc<SessionRuntime>,
    content: String,
    attachments: Vec<(String, String, Vec<u8>)>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let result = run_inner(&core, &session_id, &runtime, content, attachments, &mut cancel_rx).await;

    match result {
        Ok(message) => {
            core.event_bus.publish(
                Some(&session_id),
                AgentEventKind::Response {
                    session_id: session_id.clone(),
                    message,
                    done: true,
                },
            );
            maybe_signal_auto_compact(&core, &session_id).await;
        }
        Err(err) => {
            core.event_bus.publish(
                Some(&session_id),
                AgentEventKind::Error {
                    session_id: session_id.clone(),
                    error: err.to_string(),
                    finish_reason: None,
                },
            );
        }
    }

    core.release(&session_id).await;
}

/// Auto-compact trigger: exposed only as a threshold check published after
/// the turn's own response event, so a listening UI always sees the turn
/// finish before deciding whether to open a compaction prompt.
async fn maybe_signal_auto_compact(core: &Arc<AgentCore>, session_id: &str) {
    if core.config.options.disable_auto_summarize {
        return;
    }
    let model_info = core.main_model().await;
    if model_info.context_window() == 0 {
        return;
    }
    let Ok(session) = core.session(session_id).await else {
        return;
    };
    if (session.prompt_tokens + session.completion_tokens) as f64
        >= AUTO_COMPACT_RATIO * model_info.context_window() as f64
    {
        core.event_bus.publish(
            Some(session_id),
            AgentEventKind::Summarize {
                session_id: session_id.to_string(),
                progress: crate::events::SummarizeProgress::Starting,
                message: Some("context threshold reached".into()),
            },
        );
    }
}

async fn run_inner(
    core: &Arc<AgentCore>,
    session_id: &str,
    runtime: &Arc<SessionRuntime>,
    content: String,
    attachments: Vec<(String, String, Vec<u8>)>,
    cancel_rx: &mut watch::Receiver<bool>,
) -> AgentResult<AgentMessage> {
    // Step 3: fetch history; empty history triggers fire-and-forget title generation.
    let mut history = core.message_service.list(session_id).await?;

    if history.is_empty() {
        crate::title::spawn_title_job(core.clone(), session_id.to_string(), content.clone());
    }

    // Step 4: if a summary anchor exists, slice from it and re-type its role
    // to User — load-bearing, do not "fix": the anchor is a synthetic
    // summary that the model must see as something it was told, not said.
    let session = core.session(session_id).await?;
    if let Some(anchor_id) = &session.summary_message_id
        && let Some(pos) = history.iter().position(|m| &m.id == anchor_id)
    {
        history = history.split_off(pos);
        if let Some(anchor) = history.first_mut() {
            anchor.role = MessageRole::User;
        }
    }

    // Step 5: append the user message. Attachments are dropped (not errored)
    // for non-image-capable models.
    let model_info = core.main_model().await;
    let mut user_parts = vec![MessagePart::Text { content }];
    if model_info.capabilities.attachment {
        for (path, mime_type, bytes) in attachments {
            user_parts.push(MessagePart::Binary {
                path,
                mime_type,
                bytes,
            });
        }
    }
    let user_message = AgentMessage {
        parts: user_parts,
        ..AgentMessage::new(Uuid::new_v4().to_string(), session_id.to_string(), MessageRole::User)
    };
    core.message_service.create(user_message.clone()).await?;
    history.push(user_message);

    let mut final_message;
    loop {
        if *cancel_rx.borrow() {
            return Err(AgentError::RequestCancelled);
        }

        let tools = core.tool_registry.definitions();
        let chat_history: Vec<ChatMessage> = history.iter().map(to_chat_message).collect();

        let mut assistant_message = AgentMessage::new(
            Uuid::new_v4().to_string(),
            session_id.to_string(),
            MessageRole::Assistant,
        );
        assistant_message.model_id = Some(model_info.id.clone());

        let provider = core.main_provider().await;
        let stream_result = if provider.supports_streaming() {
            provider
                .chat_stream_with_tools(&chat_history, Some(tools.as_slice()))
                .await
        } else {
            Err(forge_provider::LLMError::NotImplemented)
        };

        let (text, thinking, mut tool_calls, finish_reason, usage, cancelled) = match stream_result {
            Ok(mut stream) => consume_stream(core, session_id, &mut stream, cancel_rx).await?,
            Err(_) => {
                // Non-streaming fallback.
                let response = provider
                    .chat_with_tools(&chat_history, Some(tools.as_slice()))
                    .await
                    .map_err(AgentError::from)?;
                (
                    response.text.clone().unwrap_or_default(),
                    response.thinking.clone(),
                    response.tool_calls.clone(),
                    response.finish_reason,
                    response.usage,
                    false,
                )
            }
        };

        // A cancellation observed mid-stream still finalizes whatever text
        // had already arrived, rather than discarding it: the assistant
        // message's `canceled` finish carries the partial content.
        if cancelled {
            if !text.is_empty() {
                assistant_message.parts.push(MessagePart::Text { content: text });
            }
            let finish = Finish {
                reason: FinishReason::Canceled,
                message: "cancelled".into(),
                detail: String::new(),
                timestamp: time::OffsetDateTime::now_utc().unix_timestamp(),
            };
            assistant_message.finish = Some(finish.clone());
            assistant_message.parts.push(MessagePart::Finish(finish));
            core.message_service.create(assistant_message.clone()).await?;
            history.push(assistant_message);
            return Err(AgentError::RequestCancelled);
        }

        if !text.is_empty() {
            assistant_message.parts.push(MessagePart::Text { content: text });
        }
        if let Some(thinking) = thinking.filter(|t| !t.is_empty()) {
            assistant_message.parts.push(MessagePart::Reasoning {
                content: thinking,
                signature: None,
            });
        }
        for call in &tool_calls {
            assistant_message.parts.push(MessagePart::ToolCall {
                id: call.id.clone(),
                name: call.function.name.clone(),
                input: call.function.arguments.clone(),
                finished: true,
            });
        }

        // Usage accounting: cost is the dot product of usage counts with
        // the model's per-million pricing.
        let cost = model_info.pricing.calculate_cost(&usage);
        let mut session = core.session(session_id).await?;
        session.prompt_tokens += usage.input_tokens + usage.cache_creation_tokens;
        session.completion_tokens += usage.output_tokens + usage.cache_read_tokens;
        session.cost_usd += cost;
        core.session_service.save(session.clone()).await?;

        let mapped_reason = map_finish_reason(finish_reason);

        if mapped_reason == FinishReason::ToolUse && !tool_calls.is_empty() {
            let finish = Finish {
                reason: FinishReason::ToolUse,
                message: "tool_use".into(),
                detail: String::new(),
                timestamp: time::OffsetDateTime::now_utc().unix_timestamp(),
            };
            assistant_message.finish = Some(finish.clone());
            assistant_message
                .parts
                .push(MessagePart::Finish(finish));

            core.message_service.create(assistant_message.clone()).await?;
            history.push(assistant_message.clone());

            let outcome = run_tool_calls(core, session_id, runtime, &mut tool_calls, cancel_rx).await;

            let tool_message = build_tool_message(session_id, &outcome);
            core.message_service.create(tool_message.clone()).await?;
            history.push(tool_message);

            if outcome.cancelled {
                return finalize_cancelled(core, session_id, &mut history).await;
            }
            if outcome.permission_denied {
                return finalize(
                    core,
                    session_id,
                    &mut history,
                    FinishReason::PermissionDenied,
                    "Permission denied",
                )
                .await;
            }

            // loop continues with the provider
            continue;
        } else {
            let (reason, message) = if *cancel_rx.borrow() {
                (FinishReason::Canceled, "cancelled".to_string())
            } else {
                (FinishReason::EndTurn, "end_turn".to_string())
            };
            let finish = Finish {
                reason,
                message,
                detail: String::new(),
                timestamp: time::OffsetDateTime::now_utc().unix_timestamp(),
            };
            assistant_message.finish = Some(finish.clone());
            assistant_message.parts.push(MessagePart::Finish(finish));
            core.message_service.create(assistant_message.clone()).await?;
            final_message = assistant_message;
            break;
        }
    }

    Ok(final_message)
}

async fn consume_stream(
    core: &Arc<AgentCore>,
    session_id: &str,
    stream: &mut forge_provider::ChatStream,
    cancel_rx: &mut watch::Receiver<bool>,
) -> AgentResult<(
    String,
    Option<String>,
    Vec<forge_provider::ToolCall>,
    ProviderFinishReason,
    forge_provider::Usage,
    bool,
)> {
    let mut text = String::new();
    let mut thinking = String::new();
    let mut tool_inputs: std::collections::HashMap<String, (String, String)> =
        std::collections::HashMap::new();
    let mut tool_order = Vec::new();
    let mut usage = forge_provider::Usage::default();
    let mut finish_reason = ProviderFinishReason::Unknown;
    let mut reasoning_open = false;

    loop {
        tokio::select! {
            _ = cancel_rx.changed() => {
                if *cancel_rx.borrow() {
                    return Ok((text, Some(thinking).filter(|t| !t.is_empty()), Vec::new(), ProviderFinishReason::Unknown, usage, true));
                }
            }
            chunk = stream.next() => {
                let Some(chunk) = chunk else { break };
                match chunk.map_err(AgentError::from)? {
                    StreamChunk::ThinkingDelta(delta) => {
                        reasoning_open = true;
                        thinking.push_str(&delta);
                        core.event_bus.publish(Some(session_id), AgentEventKind::AssistantThinkingDelta {
                            session_id: session_id.to_string(),
                            delta,
                        });
                    }
                    StreamChunk::SignatureDelta(_) => {}
                    StreamChunk::ContentDelta(delta) => {
                        reasoning_open = false;
                        text.push_str(&delta);
                        core.event_bus.publish(Some(session_id), AgentEventKind::AssistantContentDelta {
                            session_id: session_id.to_string(),
                            delta,
                        });
                    }
                    StreamChunk::ToolUseStart { id, name } => {
                        reasoning_open = false;
                        tool_order.push(id.clone());
                        tool_inputs.insert(id, (name, String::new()));
                    }
                    StreamChunk::ToolUseDelta { id, input_fragment } => {
                        if let Some((_, input)) = tool_inputs.get_mut(&id) {
                            input.push_str(&input_fragment);
                        }
                    }
                    StreamChunk::ToolUseStop { .. } => {}
                    StreamChunk::Error(err) => {
                        return Err(AgentError::ProviderError(err));
                    }
                    StreamChunk::Complete { response } => {
                        usage = response.usage;
                        finish_reason = response.finish_reason;
                        if !response.tool_calls.is_empty() {
                            return Ok((text, Some(thinking).filter(|t| !t.is_empty()), response.tool_calls, finish_reason, usage, false));
                        }
                        break;
                    }
                }
            }
        }
    }

    let _ = reasoning_open;
    let tool_calls = tool_order
        .into_iter()
        .filter_map(|id| {
            tool_inputs.remove(&id).map(|(name, input)| forge_provider::ToolCall {
                id,
                function: forge_provider::FunctionCall {
                    name,
                    arguments: input,
                },
            })
        })
        .collect();

    Ok((
        text,
        Some(thinking).filter(|t| !t.is_empty()),
        tool_calls,
        finish_reason,
        usage,
        false,
    ))
}

fn build_tool_message(session_id: &str, outcome: &ToolOutcome) -> AgentMessage {
    let mut message = AgentMessage::new(Uuid::new_v4().to_string(), session_id.to_string(), MessageRole::Tool);
    for result in &outcome.results {
        message.parts.push(MessagePart::ToolResult {
            tool_call_id: result.call_id.clone(),
            content: result.content.clone(),
            metadata: None,
            is_error: result.is_error,
        });
    }
    message
}

async fn finalize(
    core: &Arc<AgentCore>,
    session_id: &str,
    history: &mut Vec<AgentMessage>,
    reason: FinishReason,
    message: &str,
) -> AgentResult<AgentMessage> {
    let mut final_message = AgentMessage::new(
        Uuid::new_v4().to_string(),
        session_id.to_string(),
        MessageRole::Assistant,
    );
    let finish = Finish {
        reason,
        message: message.to_string(),
        detail: String::new(),
        timestamp: time::OffsetDateTime::now_utc().unix_timestamp(),
    };
    final_message.finish = Some(finish.clone());
    final_message.parts.push(MessagePart::Finish(finish));
    core.message_service.create(final_message.clone()).await?;
    history.push(final_message.clone());
    Ok(final_message)
}

async fn finalize_cancelled(
    core: &Arc<AgentCore>,
    session_id: &str,
    history: &mut Vec<AgentMessage>,
) -> AgentResult<AgentMessage> {
    finalize(core, session_id, history, FinishReason::Canceled, "cancelled").await?;
    Err(AgentError::RequestCancelled)
}
