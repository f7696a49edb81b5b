//! In-memory `SessionService`/`MessageService` reference implementation —
//! a test and `forge-cli` double standing in for a durable backend.

use super::{MessageService, SessionService};
use crate::error::{AgentError, AgentResult};
use crate::model::{AgentMessage, Session};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

pub struct InMemorySessionService {
    sessions: Mutex<HashMap<String, Session>>,
    tx: broadcast::Sender<Session>,
}

impl InMemorySessionService {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            sessions: Mutex::new(HashMap::new()),
            tx,
        }
    }
}

impl Default for InMemorySessionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn create(&self, title: Option<String>) -> AgentResult<Session> {
        let session = Session::new(Uuid::new_v4().to_string(), title, None);
        self.sessions
            .lock()
            .insert(session.id.clone(), session.clone());
        let _ = self.tx.send(session.clone());
        Ok(session)
    }

    async fn get(&self, id: &str) -> AgentResult<Option<Session>> {
        Ok(self.sessions.lock().get(id).cloned())
    }

    async fn save(&self, mut session: Session) -> AgentResult<Session> {
        session.updated_at = time::OffsetDateTime::now_utc();
        self.sessions
            .lock()
            .insert(session.id.clone(), session.clone());
        let _ = self.tx.send(session.clone());
        Ok(session)
    }

    async fn list(&self) -> AgentResult<Vec<Session>> {
        Ok(self.sessions.lock().values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> AgentResult<()> {
        self.sessions
            .lock()
            .remove(id)
            .ok_or_else(|| AgentError::StorageError(format!("no session {id}")))?;
        Ok(())
    }

    async fn create_title_session(&self, parent: &str) -> AgentResult<Session> {
        let session = Session::new(Uuid::new_v4().to_string(), None, Some(parent.to_string()));
        self.sessions
            .lock()
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn create_task_session(
        &self,
        _call_id: &str,
        parent: &str,
        title: Option<String>,
    ) -> AgentResult<Session> {
        let session = Session::new(Uuid::new_v4().to_string(), title, Some(parent.to_string()));
        self.sessions
            .lock()
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn subscribe(&self) -> broadcast::Receiver<Session> {
        self.tx.subscribe()
    }
}

pub struct InMemoryMessageService {
    messages: Mutex<Vec<AgentMessage>>,
    tx: broadcast::Sender<AgentMessage>,
}

impl InMemoryMessageService {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            messages: Mutex::new(Vec::new()),
            tx,
        }
    }
}

impl Default for InMemoryMessageService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageService for InMemoryMessageService {
    async fn create(&self, message: AgentMessage) -> AgentResult<AgentMessage> {
        self.messages.lock().push(message.clone());
        let _ = self.tx.send(message.clone());
        Ok(message)
    }

    async fn list(&self, session_id: &str) -> AgentResult<Vec<AgentMessage>> {
        Ok(self
            .messages
            .lock()
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn update(&self, message: AgentMessage) -> AgentResult<()> {
        let mut messages = self.messages.lock();
        if let Some(existing) = messages.iter_mut().find(|m| m.id == message.id) {
            *existing = message.clone();
        } else {
            messages.push(message.clone());
        }
        drop(messages);
        let _ = self.tx.send(message);
        Ok(())
    }

    async fn delete(&self, message_id: &str) -> AgentResult<()> {
        self.messages.lock().retain(|m| m.id != message_id);
        Ok(())
    }

    async fn delete_session_messages(&self, session_id: &str) -> AgentResult<()> {
        self.messages.lock().retain(|m| m.session_id != session_id);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AgentMessage> {
        self.tx.subscribe()
    }
}
