//! Crossing the auto-compact threshold after a turn: the turn's own
//! `Response{done: true}` event is always observed before the `Summarize`
//! threshold signal that follows it.

mod common;

use common::*;
use forge_agent::events::AgentEventKind;
use forge_agent::events::SummarizeProgress;
use forge_provider::{FinishReason as ProviderFinishReason, ModelInfo, Usage};
use std::sync::Arc;
use std::time::Duration;

fn small_context_model() -> ModelInfo {
    let mut info = ModelInfo::default();
    info.constraints.context = Some(100);
    info
}

#[tokio::test]
async fn crossing_the_threshold_signals_after_the_turns_own_response() {
    let usage = Usage {
        input_tokens: 90,
        output_tokens: 8,
        ..Default::default()
    };
    let provider = ScriptedProvider::new(vec![text_response(
        "done",
        ProviderFinishReason::Stop,
        usage,
    )]);

    let core = build_core_with_model(
        Arc::new(provider),
        forge_agent::tools::registry::ToolRegistry::new(),
        small_context_model(),
    );
    let session = core.session_service.create(None).await.unwrap();

    let mut events = forge_agent::agent::run(core.clone(), session.id.clone(), "hi".into(), Vec::new())
        .await
        .unwrap();

    let mut saw_response_done = false;
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        match event.kind {
            AgentEventKind::Response { done: true, .. } => {
                saw_response_done = true;
            }
            AgentEventKind::Summarize { progress: SummarizeProgress::Starting, .. } => {
                assert!(
                    saw_response_done,
                    "Summarize{{Starting}} must follow the turn's own Response{{done:true}}"
                );
                break;
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn disable_auto_summarize_suppresses_the_threshold_signal() {
    let usage = Usage {
        input_tokens: 90,
        output_tokens: 8,
        ..Default::default()
    };
    let provider = ScriptedProvider::new(vec![text_response(
        "done",
        ProviderFinishReason::Stop,
        usage,
    )]);

    let core = build_core_full(
        Arc::new(provider),
        forge_agent::tools::registry::ToolRegistry::new(),
        small_context_model(),
        forge_agent::config::Options {
            disable_auto_summarize: true,
            ..Default::default()
        },
    );
    let session = core.session_service.create(None).await.unwrap();
    let mut events = forge_agent::agent::run(core.clone(), session.id.clone(), "hi".into(), Vec::new())
        .await
        .unwrap();

    // Only a Response{done:true} is guaranteed; give the threshold signal a
    // short window to (not) arrive afterward.
    let mut kinds = Vec::new();
    for _ in 0..2 {
        if let Ok(Ok(event)) = tokio::time::timeout(Duration::from_millis(200), events.recv()).await {
            kinds.push(event.kind);
        }
    }
    assert!(kinds.iter().any(|k| matches!(k, AgentEventKind::Response { done: true, .. })));
    assert!(
        !kinds.iter().any(|k| matches!(k, AgentEventKind::Summarize { .. })),
        "disable_auto_summarize must suppress the threshold signal"
    );
}
