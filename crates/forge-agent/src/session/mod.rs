//! Persistence contracts the engine depends on. Concrete durable backends
//! live outside this crate; `memory` provides an in-memory reference
//! implementation used by tests and `forge-cli`.

pub mod memory;

use crate::error::AgentResult;
use crate::model::{AgentMessage, Session};
use async_trait::async_trait;
use tokio::sync::broadcast;

#[async_trait]
pub trait MessageService: Send + Sync {
    async fn create(&self, message: AgentMessage) -> AgentResult<AgentMessage>;
    async fn list(&self, session_id: &str) -> AgentResult<Vec<AgentMessage>>;
    async fn update(&self, message: AgentMessage) -> AgentResult<()>;
    async fn delete(&self, message_id: &str) -> AgentResult<()>;
    async fn delete_session_messages(&self, session_id: &str) -> AgentResult<()>;
    fn subscribe(&self) -> broadcast::Receiver<AgentMessage>;
}

#[async_trait]
pub trait SessionService: Send + Sync {
    async fn create(&self, title: Option<String>) -> AgentResult<Session>;
    async fn get(&self, id: &str) -> AgentResult<Option<Session>>;
    async fn save(&self, session: Session) -> AgentResult<Session>;
    async fn list(&self) -> AgentResult<Vec<Session>>;
    async fn delete(&self, id: &str) -> AgentResult<()>;
    /// A session created solely to host a title-generation job.
    async fn create_title_session(&self, parent: &str) -> AgentResult<Session>;
    /// A session created to host a delegated sub-agent task.
    async fn create_task_session(
        &self,
        call_id: &str,
        parent: &str,
        title: Option<String>,
    ) -> AgentResult<Session>;
    fn subscribe(&self) -> broadcast::Receiver<Session>;
}
