//! Sub-agent dispatch: a `delegate` tool call spins up a child
//! session that shares the parent's `AgentCore` (same models, tools,
//! permission broker, event bus), forwards the parent turn's cancellation
//! into the child, and resolves to the child's final assistant text.

use crate::agent::core::AgentCore;
use crate::error::{AgentError, AgentResult};
use crate::events::AgentEventKind;
use std::sync::Arc;
use tokio::sync::watch;

pub async fn delegate(
    core: Arc<AgentCore>,
    parent_session_id: &str,
    call_id: &str,
    task: String,
    title: Option<String>,
    mut parent_cancel_rx: watch::Receiver<bool>,
) -> AgentResult<String> {
    let child_session = core
        .session_service
        .create_task_session(call_id, parent_session_id, title)
        .await
        .map_err(|e| AgentError::StorageError(e.to_string()))?;
    let child_session_id = child_session.id.clone();

    let mut events = crate::agent::run(core.clone(), child_session_id.clone(), task, Vec::new()).await?;

    // Recursive cancellation linkage: the parent's cancel signal propagates
    // to the child's own `activeRequests` entry, rather than the child
    // running to completion after its parent has already given up.
    let core_for_forward = core.clone();
    let forward_id = child_session_id.clone();
    let forward = tokio::spawn(async move {
        if parent_cancel_rx.changed().await.is_ok() && *parent_cancel_rx.borrow() {
            core_for_forward.cancel(&forward_id).await;
        }
    });

    let result = loop {
        match events.recv().await {
            Ok(event) if event.session_id.as_deref() == Some(child_session_id.as_str()) => match event.kind {
                AgentEventKind::Response { message, done: true, .. } => break Ok(message.text()),
                AgentEventKind::Error { error, .. } => break Err(AgentError::Internal(error)),
                _ => continue,
            },
            Ok(_) => continue,
            Err(_) => {
                break Err(AgentError::Internal(
                    "delegated session closed without a response".into(),
                ));
            }
        }
    };

    forward.abort();
    result
}
