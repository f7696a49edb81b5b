//! A turn with no tool calls: the provider streams a few content deltas and
//! completes with `end_turn`, producing exactly one assistant message and
//! one terminal `Response{done: true}` event.

mod common;

use common::*;
use forge_agent::events::AgentEventKind;
use forge_agent::model::{FinishReason, MessageRole};
use forge_provider::{FinishReason as ProviderFinishReason, StreamChunk, Usage};
use std::sync::Arc;

#[tokio::test]
async fn single_turn_with_no_tools_produces_one_assistant_message() {
    let usage = Usage {
        input_tokens: 10,
        output_tokens: 3,
        ..Default::default()
    };
    let provider = StreamingProvider::new(vec![
        (0, StreamChunk::ContentDelta("hi".into())),
        (0, StreamChunk::ContentDelta(" there".into())),
        (0, StreamChunk::ContentDelta("!".into())),
        (
            0,
            StreamChunk::Complete {
                response: text_response("", ProviderFinishReason::Stop, usage),
            },
        ),
    ]);

    let core = build_core(Arc::new(provider), forge_agent::tools::registry::ToolRegistry::new());
    let session = core.session_service.create(None).await.unwrap();

    let events = forge_agent::agent::run(core.clone(), session.id.clone(), "hello".into(), Vec::new())
        .await
        .unwrap();
    let collected = collect_until_done(events).await;

    let deltas = collected
        .iter()
        .filter(|e| matches!(e.kind, AgentEventKind::AssistantContentDelta { .. }))
        .count();
    assert_eq!(deltas, 3);

    let response = collected
        .iter()
        .find_map(|e| match &e.kind {
            AgentEventKind::Response { message, done, .. } if *done => Some(message.clone()),
            _ => None,
        })
        .expect("expected a terminal Response event");

    assert_eq!(response.role, MessageRole::Assistant);
    assert_eq!(response.text(), "hi there!");
    let finish = response.finish.expect("assistant message must carry a finish");
    assert_eq!(finish.reason, FinishReason::EndTurn);

    let session = core.session(&session.id).await.unwrap();
    assert_eq!(session.prompt_tokens, 10);
    assert_eq!(session.completion_tokens, 3);

    let history = core.message_service.list(&session.id).await.unwrap();
    let assistant_messages = history
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .count();
    assert_eq!(assistant_messages, 1);
}
