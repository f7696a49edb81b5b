//! Concurrent, permission-gated tool call dispatch.
//!
//! Every tool call named in the assistant message's `tool_call` parts runs
//! concurrently. A cancellation observed mid-dispatch does not abort calls
//! already running; it stops starting new ones and fills every call that
//! never got a result with a `canceled` sentinel, so the following tool
//! message always carries exactly one `tool_result` per `tool_call` id.
//!
//! A denial is also a stop signal for the rest of the batch: once any call
//! in flight is denied permission, every sibling that hasn't started
//! executing yet is auto-returned a cancellation result instead of running,
//! via a shared flag each call checks before it does real work.

use crate::agent::core::{AgentCore, SessionRuntime};
use crate::events::AgentEventKind;
use crate::permission::PermissionRequest;
use crate::tools::context::ToolContext;
use forge_provider::{ToolCall, ToolResultPayload};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use uuid::Uuid;

const DENIED_SENTINEL: &str = "Tool execution canceled by user";

pub struct ToolOutcome {
    pub results: Vec<ToolResultPayload>,
    pub cancelled: bool,
    pub permission_denied: bool,
}

pub async fn run_tool_calls(
    core: &Arc<AgentCore>,
    session_id: &str,
    runtime: &Arc<SessionRuntime>,
    tool_calls: &mut Vec<ToolCall>,
    cancel_rx: &mut watch::Receiver<bool>,
) -> ToolOutcome {
    if *cancel_rx.borrow() {
        return cancelled_outcome(tool_calls);
    }

    let denied = Arc::new(AtomicBool::new(false));
    let futures = tool_calls.iter().cloned().map(|call| {
        run_one(
            core.clone(),
            session_id.to_string(),
            runtime.clone(),
            call,
            denied.clone(),
            cancel_rx.clone(),
        )
    });

    let dispatch = futures::future::join_all(futures);

    tokio::select! {
        results = dispatch => {
            let permission_denied = results.iter().any(|r| r.is_permission_denied);
            ToolOutcome {
                results: results.into_iter().map(|r| r.payload).collect(),
                cancelled: false,
                permission_denied,
            }
        }
        _ = cancel_rx.changed() => {
            cancelled_outcome(tool_calls)
        }
    }
}

fn cancelled_outcome(tool_calls: &[ToolCall]) -> ToolOutcome {
    ToolOutcome {
        results: tool_calls
            .iter()
            .map(|call| ToolResultPayload {
                call_id: call.id.clone(),
                content: "cancelled".into(),
                is_error: true,
            })
            .collect(),
        cancelled: true,
        permission_denied: false,
    }
}

struct OneResult {
    payload: ToolResultPayload,
    is_permission_denied: bool,
}

async fn run_one(
    core: Arc<AgentCore>,
    session_id: String,
    runtime: Arc<SessionRuntime>,
    call: ToolCall,
    denied: Arc<AtomicBool>,
    cancel_rx: watch::Receiver<bool>,
) -> OneResult {
    core.event_bus.publish(
        Some(&session_id),
        AgentEventKind::ToolCallStart {
            tool_call_id: call.id.clone(),
            tool_name: call.function.name.clone(),
            arguments: call.function.arguments.clone(),
        },
    );

    let (content, is_error, is_permission_denied) =
        execute(&core, &session_id, &runtime, &call, &denied, cancel_rx).await;

    core.event_bus.publish(
        Some(&session_id),
        AgentEventKind::ToolCallEnd {
            tool_call_id: call.id.clone(),
            tool_name: call.function.name.clone(),
            is_error,
            result: content.clone(),
        },
    );

    OneResult {
        payload: ToolResultPayload {
            call_id: call.id,
            content,
            is_error,
        },
        is_permission_denied,
    }
}

async fn execute(
    core: &Arc<AgentCore>,
    session_id: &str,
    runtime: &Arc<SessionRuntime>,
    call: &ToolCall,
    denied: &Arc<AtomicBool>,
    cancel_rx: watch::Receiver<bool>,
) -> (String, bool, bool) {
    if denied.load(Ordering::SeqCst) {
        return (DENIED_SENTINEL.into(), true, false);
    }

    let Some(tool) = core.tool_registry.get(&call.function.name) else {
        return (format!("Tool not found: {}", call.function.name), true, false);
    };

    let arguments: serde_json::Value = match serde_json::from_str(&call.function.arguments) {
        Ok(v) => v,
        Err(e) => return (format!("invalid arguments: {e}"), true, false),
    };

    if let Some(requirement) = tool.required_capability(&arguments) {
        let granted = core
            .permission_broker
            .request(PermissionRequest {
                id: Uuid::new_v4().to_string(),
                session_id: session_id.to_string(),
                tool_call_id: call.id.clone(),
                tool_name: call.function.name.clone(),
                path: requirement.path,
                action: requirement.action,
                description: requirement.description,
                parameters: arguments.clone(),
            })
            .await;
        if !granted {
            denied.store(true, Ordering::SeqCst);
            return ("Permission denied".into(), true, true);
        }
    }

    if denied.load(Ordering::SeqCst) {
        return (DENIED_SENTINEL.into(), true, false);
    }

    let ctx = ToolContext {
        session_id: session_id.to_string(),
        tool_call_id: call.id.clone(),
        cwd: runtime.cwd.clone(),
        core: core.clone(),
        cancel_rx,
    };

    match tool.execute(&ctx, arguments).await {
        Ok(output) => (output, false, false),
        Err(err) => (err.to_string(), true, false),
    }
}
