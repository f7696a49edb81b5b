//! Cancelling a turn mid-stream finalizes the assistant message with
//! whatever text arrived before the cancel, rather than discarding it, and
//! surfaces `RequestCancelled` as the turn's terminal error.

mod common;

use common::*;
use forge_agent::error::AgentError;
use forge_agent::events::AgentEventKind;
use forge_agent::model::{FinishReason, MessageRole};
use forge_provider::StreamChunk;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn cancel_mid_stream_finalizes_partial_text_as_canceled() {
    let provider = StreamingProvider::new(vec![
        (0, StreamChunk::ContentDelta("partial answer".into())),
        // Long enough that the test's cancel always lands first.
        (2000, StreamChunk::ContentDelta(" more".into())),
    ]);

    let core = build_core(Arc::new(provider), forge_agent::tools::registry::ToolRegistry::new());
    let session = core.session_service.create(None).await.unwrap();

    let mut events = forge_agent::agent::run(core.clone(), session.id.clone(), "go".into(), Vec::new())
        .await
        .unwrap();

    // Wait for the first delta, then cancel before the second chunk arrives.
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        if matches!(event.kind, AgentEventKind::AssistantContentDelta { .. }) {
            break;
        }
    }
    core.cancel(&session.id).await;

    let terminal = loop {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        if matches!(event.kind, AgentEventKind::Error { .. }) {
            break event;
        }
    };

    match terminal.kind {
        AgentEventKind::Error { error, .. } => {
            assert_eq!(error, AgentError::RequestCancelled.to_string());
        }
        other => panic!("expected Error event, got {other:?}"),
    }

    let history = core.message_service.list(&session.id).await.unwrap();
    let assistant = history
        .iter()
        .find(|m| m.role == MessageRole::Assistant)
        .expect("a canceled assistant message must still be persisted");
    assert_eq!(assistant.text(), "partial answer");
    assert_eq!(assistant.finish.as_ref().unwrap().reason, FinishReason::Canceled);

    assert!(!core.is_session_busy(&session.id).await);
}
