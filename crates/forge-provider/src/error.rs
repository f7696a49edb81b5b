use thiserror::Error;

/// Errors surfaced by a provider client implementation.
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("authentication error: {0}")]
    Auth(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("response format error: {message} (raw: {raw_response})")]
    ResponseFormat {
        message: String,
        raw_response: String,
    },
    #[error("json error: {0}")]
    Json(String),
    #[error("streaming not implemented by this provider")]
    NotImplemented,
}

impl From<serde_json::Error> for LLMError {
    fn from(err: serde_json::Error) -> Self {
        LLMError::Json(format!("{} at line {} column {}", err, err.line(), err.column()))
    }
}

impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        LLMError::Http(err.to_string())
    }
}
