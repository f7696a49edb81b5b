//! Agent Core module: the public `Run` entry point plus its two internal
//! collaborators, the turn state machine and the tool dispatcher.

pub mod core;
pub mod state_machine;
pub mod tool_worker;

use crate::error::AgentResult;
use crate::events::AgentEvent;
use core::AgentCore;
use std::sync::Arc;
use tokio::sync::broadcast;

/// `Run(sessionID, content, attachments)`. Reserves `activeRequests[sessionID]`
/// synchronously — a session already running a turn fails fast with
/// `SessionBusy` before anything is spawned — then drives the turn on a
/// detached task and hands the caller its event subscription. The caller is
/// suspended only at this call, not for the duration of the turn.
pub async fn run(
    core: Arc<AgentCore>,
    session_id: String,
    content: String,
    attachments: Vec<(String, String, Vec<u8>)>,
) -> AgentResult<broadcast::Receiver<AgentEvent>> {
    let (_handle, cancel_rx) = core.reserve(&session_id, &session_id).await?;
    let runtime = core.runtime_for(&session_id).await;
    let subscription = core.event_bus.subscribe();

    tokio::spawn(state_machine::execute_turn(
        core,
        session_id,
        runtime,
        content,
        attachments,
        cancel_rx,
    ));

    Ok(subscription)
}
