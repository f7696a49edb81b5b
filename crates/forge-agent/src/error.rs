//! Error taxonomy. Propagation policy is documented on the variant it
//! governs.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum AgentError {
    /// Duplicate `Run` on a session that already has an in-flight request.
    /// Returned synchronously from `Run`, never published as an event.
    #[error("session {session_id} is already running a turn")]
    SessionBusy { session_id: String },

    /// User cancel or context deadline. Absorbed quietly: published as a
    /// single structured error event, no log noise.
    #[error("request cancelled")]
    RequestCancelled,

    /// A tool's permission request was denied. Local to the tool call; the
    /// engine interprets it and finalizes the turn with `permission_denied`.
    #[error("permission denied: {reason}")]
    PermissionDenied { reason: String },

    /// Stream `Error` event, or provider construction failure.
    #[error("provider error: {0}")]
    ProviderError(String),

    /// Message/session persistence failure. Logged; the engine best-effort
    /// finalizes the message, and the turn may be partial.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Missing provider/model at construction or `UpdateModel` time.
    #[error("config error: {0}")]
    ConfigError(String),

    /// Catch-all for recovered panics inside tool workers or background
    /// jobs: a `JoinError` from a panicked task is converted here rather
    /// than propagated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<forge_provider::LLMError> for AgentError {
    fn from(err: forge_provider::LLMError) -> Self {
        AgentError::ProviderError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AgentError {
    fn from(err: tokio::task::JoinError) -> Self {
        AgentError::Internal(format!("background task failed: {err}"))
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
