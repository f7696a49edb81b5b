//! The `Tool` contract: what a builtin or MCP-backed tool looks like from
//! the agent core's side.

use crate::agent::core::AgentCore;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// A single permission check a tool call needs before it runs. Absent for
/// tools that never touch the filesystem or a process (e.g. a pure lookup).
#[derive(Debug, Clone)]
pub struct CapabilityRequirement {
    pub action: String,
    pub path: String,
    pub description: String,
}

/// Per-call context a tool executes with: which session/call this is, the
/// session's working directory, and the handles a sub-agent-dispatching
/// tool needs to run a child turn — the engine itself, and the parent run's
/// cancellation signal so a delegated child can be recursively cancelled.
#[derive(Clone)]
pub struct ToolContext {
    pub session_id: String,
    pub tool_call_id: String,
    pub cwd: Option<PathBuf>,
    pub core: Arc<AgentCore>,
    pub cancel_rx: watch::Receiver<bool>,
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> forge_provider::ParametersSchema;

    /// The capability this particular call needs checked against the
    /// Permission Broker, given its already-parsed arguments. `None` means
    /// the call proceeds without a permission round-trip.
    fn required_capability(&self, arguments: &Value) -> Option<CapabilityRequirement> {
        let _ = arguments;
        None
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<String, ToolError>;
}
