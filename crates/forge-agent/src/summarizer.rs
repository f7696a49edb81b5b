//! Summarizer: compacts a session's history into a synthetic anchor
//! message when `Summarize` is invoked, either explicitly or by the
//! agent core's own auto-compact trigger at 95% of context.

use crate::agent::core::AgentCore;
use crate::error::{AgentError, AgentResult};
use crate::events::{AgentEventKind, SummarizeProgress};
use crate::model::{AgentMessage, Finish, FinishReason, MessagePart, MessageRole};
use forge_provider::ChatMessageBuilder;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const SUMMARIZER_SYSTEM_PROMPT: &str =
    "You are compacting a long conversation so it can continue within a smaller context \
     budget. Write a dense summary covering: the user's goals, decisions made, files or \
     state touched, and any open threads. Be exhaustive about facts, terse about prose.";

const SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs under the `"{session_id}-summarize"` key so it never collides with
/// `activeRequests[session_id]` and therefore never makes `IsSessionBusy`
/// report true for a plain `Run`.
pub async fn run_summarize(core: Arc<AgentCore>, session_id: String) -> AgentResult<()> {
    let key = format!("{session_id}-summarize");
    let (_handle, _cancel_rx) = core.reserve(&key, &session_id).await?;
    let result = summarize(&core, &session_id).await;
    core.release(&key).await;
    result
}

async fn summarize(core: &Arc<AgentCore>, session_id: &str) -> AgentResult<()> {
    core.event_bus.publish(
        Some(session_id),
        AgentEventKind::Summarize {
            session_id: session_id.to_string(),
            progress: SummarizeProgress::Analyzing,
            message: None,
        },
    );

    let history = core
        .message_service
        .list(session_id)
        .await
        .map_err(|e| AgentError::StorageError(e.to_string()))?;

    let transcript = history
        .iter()
        .map(|m| format!("{:?}: {}", m.role, m.text()))
        .collect::<Vec<_>>()
        .join("\n");

    core.event_bus.publish(
        Some(session_id),
        AgentEventKind::Summarize {
            session_id: session_id.to_string(),
            progress: SummarizeProgress::Generating,
            message: None,
        },
    );

    let provider = core.small_provider().await;
    let request = vec![
        ChatMessageBuilder::user()
            .content(format!("{SUMMARIZER_SYSTEM_PROMPT}\n\n{transcript}"))
            .build(),
    ];
    let response = tokio::time::timeout(SUMMARIZE_TIMEOUT, provider.chat(&request))
        .await
        .map_err(|_| AgentError::ProviderError("summarize timed out".into()))??;

    let summary_text = response.text.unwrap_or_default();

    let mut summary_message = AgentMessage::new(
        Uuid::new_v4().to_string(),
        session_id.to_string(),
        MessageRole::Assistant,
    );
    summary_message.parts.push(MessagePart::Text {
        content: format!("[conversation summary]\n{summary_text}"),
    });
    let finish = Finish {
        reason: FinishReason::EndTurn,
        message: "end_turn".into(),
        detail: String::new(),
        timestamp: time::OffsetDateTime::now_utc().unix_timestamp(),
    };
    summary_message.finish = Some(finish.clone());
    summary_message.parts.push(MessagePart::Finish(finish));
    core.message_service
        .create(summary_message.clone())
        .await
        .map_err(|e| AgentError::StorageError(e.to_string()))?;

    let mut session = core.session(session_id).await?;
    session.summary_message_id = Some(summary_message.id);
    core.session_service
        .save(session)
        .await
        .map_err(|e| AgentError::StorageError(e.to_string()))?;

    core.event_bus.publish(
        Some(session_id),
        AgentEventKind::Summarize {
            session_id: session_id.to_string(),
            progress: SummarizeProgress::Done,
            message: None,
        },
    );
    Ok(())
}
