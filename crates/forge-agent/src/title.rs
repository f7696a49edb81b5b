//! Title generator: a one-shot, small-model job fired when a session's
//! first user message is appended. Decoupled from the turn's own
//! cancellation — a cancelled `Run` does not cancel title generation, and a
//! title failure never surfaces as a turn error.

use crate::agent::core::AgentCore;
use forge_provider::{ChatMessageBuilder, ChatRole, MessageType};
use std::sync::Arc;

const MAX_TOKENS_HINT: usize = 40;
const SYSTEM_PROMPT: &str =
    "Summarize the user's first message as a short title, 6 words or fewer. \
     Respond with the title only, no quotes or punctuation at the end.";

/// Fire-and-forget: spawned by the state machine when a session's history
/// was empty before the current turn's user message was appended.
pub fn spawn_title_job(core: Arc<AgentCore>, session_id: String, first_message: String) {
    tokio::spawn(async move {
        if let Err(err) = run(&core, &session_id, &first_message).await {
            log::warn!("title generation for session {session_id} failed: {err}");
        }
    });
}

async fn run(core: &Arc<AgentCore>, session_id: &str, first_message: &str) -> crate::error::AgentResult<()> {
    let provider = core.small_provider().await;
    let history = vec![
        ChatMessageBuilder::user()
            .content(format!("{SYSTEM_PROMPT}\n\n{first_message}"))
            .build(),
    ];
    let response = provider.chat(&history).await?;
    let title = response
        .text
        .unwrap_or_default()
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .chars()
        .take(MAX_TOKENS_HINT * 8)
        .collect::<String>();

    // An empty model response leaves the session's title unchanged rather
    // than overwriting it with a blank string.
    if title.is_empty() {
        return Ok(());
    }

    let mut session = core.session(session_id).await?;
    session.title = Some(title);
    core.session_service
        .save(session)
        .await
        .map_err(|e| crate::error::AgentError::StorageError(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_asks_for_a_short_title() {
        assert!(SYSTEM_PROMPT.contains("6 words"));
    }

    #[test]
    fn message_type_used_is_plain_text() {
        let msg = ChatMessageBuilder::user().content("hi").build();
        assert_eq!(msg.role, ChatRole::User);
        assert!(matches!(msg.message_type, MessageType::Text));
    }
}
