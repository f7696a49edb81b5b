//! Agent core: public contract, `activeRequests`, model slots.

use crate::config::Config;
use crate::error::{AgentError, AgentResult};
use crate::event_bus::EventBus;
use crate::model::Session;
use crate::permission::PermissionBroker;
use crate::session::{MessageService, SessionService};
use crate::tools::registry::ToolRegistry;
use forge_provider::{ChatProvider, ModelInfo};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};

/// A per-run cancellation handle, keyed in `activeRequests` by session id.
/// Held for the duration of one `Run`, or one `Summarize` job under the
/// `"{id}-summarize"` key.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Per-session infrastructure that outlives any single turn: working
/// directory, and (later) registered MCP tool state.
pub struct SessionRuntime {
    pub cwd: Option<PathBuf>,
}

pub struct ModelSlot {
    pub provider: Arc<dyn ChatProvider>,
    pub info: ModelInfo,
    pub provider_id: String,
    pub model_id: String,
}

/// Orchestrates turns across all sessions. One instance per running agent.
pub struct AgentCore {
    pub event_bus: Arc<EventBus>,
    pub permission_broker: Arc<PermissionBroker>,
    pub session_service: Arc<dyn SessionService>,
    pub message_service: Arc<dyn MessageService>,
    pub tool_registry: Arc<ToolRegistry>,
    pub config: Config,

    pub(crate) active_requests: Mutex<HashMap<String, Arc<CancelHandle>>>,
    pub(crate) session_runtimes: Mutex<HashMap<String, Arc<SessionRuntime>>>,

    main: Mutex<ModelSlot>,
    small: Mutex<ModelSlot>,
}

impl AgentCore {
    pub fn new(
        event_bus: Arc<EventBus>,
        permission_broker: Arc<PermissionBroker>,
        session_service: Arc<dyn SessionService>,
        message_service: Arc<dyn MessageService>,
        tool_registry: Arc<ToolRegistry>,
        config: Config,
        main: ModelSlot,
        small: ModelSlot,
    ) -> Self {
        Self {
            event_bus,
            permission_broker,
            session_service,
            message_service,
            tool_registry,
            config,
            active_requests: Mutex::new(HashMap::new()),
            session_runtimes: Mutex::new(HashMap::new()),
            main: Mutex::new(main),
            small: Mutex::new(small),
        }
    }

    pub async fn main_model(&self) -> ModelInfo {
        self.main.lock().await.info.clone()
    }

    pub async fn main_provider(&self) -> Arc<dyn ChatProvider> {
        self.main.lock().await.provider.clone()
    }

    pub async fn small_provider(&self) -> Arc<dyn ChatProvider> {
        self.small.lock().await.provider.clone()
    }

    /// `UpdateModel`: rebuild the main client in place if the provider/model
    /// selection changed. A no-op when unchanged — no new client is
    /// constructed.
    pub async fn update_model(&self, provider_id: &str, model_id: &str, new_slot: impl FnOnce() -> AgentResult<ModelSlot>) -> AgentResult<()> {
        let mut slot = self.main.lock().await;
        if slot.provider_id == provider_id && slot.model_id == model_id {
            return Ok(());
        }
        *slot = new_slot()?;
        Ok(())
    }

    pub async fn is_session_busy(&self, session_id: &str) -> bool {
        // Checks only the bare session_id key; `Summarize` stores under
        // "{session_id}-summarize" so a summarize job in flight does not
        // make this return true.
        self.active_requests.lock().await.contains_key(session_id)
    }

    pub async fn is_busy(&self) -> bool {
        !self.active_requests.lock().await.is_empty()
    }

    /// Reserve `activeRequests[key]`, or fail with `SessionBusy` if already
    /// held. The check-and-insert happens under one lock acquisition so two
    /// concurrent `Run`s on the same session cannot both win.
    pub(crate) async fn reserve(
        &self,
        key: &str,
        session_id: &str,
    ) -> AgentResult<(Arc<CancelHandle>, watch::Receiver<bool>)> {
        let mut active = self.active_requests.lock().await;
        if active.contains_key(key) {
            return Err(AgentError::SessionBusy {
                session_id: session_id.to_string(),
            });
        }
        let (handle, rx) = CancelHandle::new();
        let handle = Arc::new(handle);
        active.insert(key.to_string(), handle.clone());
        Ok((handle, rx))
    }

    pub(crate) async fn release(&self, key: &str) {
        self.active_requests.lock().await.remove(key);
    }

    /// `Cancel(sessionID)`: signal cancellation, return immediately.
    pub async fn cancel(&self, session_id: &str) {
        if let Some(handle) = self.active_requests.lock().await.get(session_id) {
            handle.cancel();
        }
    }

    /// `CancelAll`: signal cancellation for every in-flight request, then
    /// poll `IsBusy` every 200ms for up to 5s.
    pub async fn cancel_all(&self) {
        for handle in self.active_requests.lock().await.values() {
            handle.cancel();
        }
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            if !self.is_busy().await {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }

    pub(crate) async fn runtime_for(&self, session_id: &str) -> Arc<SessionRuntime> {
        let mut runtimes = self.session_runtimes.lock().await;
        runtimes
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(SessionRuntime { cwd: None }))
            .clone()
    }

    pub async fn session(&self, session_id: &str) -> AgentResult<Session> {
        self.session_service
            .get(session_id)
            .await?
            .ok_or_else(|| AgentError::StorageError(format!("no session {session_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reserve_twice_for_same_key_returns_session_busy() {
        let core = test_core().await;
        let (_h, _rx) = core.reserve("s1", "s1").await.unwrap();
        let err = core.reserve("s1", "s1").await.unwrap_err();
        assert!(matches!(err, AgentError::SessionBusy { .. }));
    }

    #[tokio::test]
    async fn release_frees_the_key_for_reuse() {
        let core = test_core().await;
        let (_h, _rx) = core.reserve("s1", "s1").await.unwrap();
        core.release("s1").await;
        assert!(core.reserve("s1", "s1").await.is_ok());
    }

    #[tokio::test]
    async fn summarize_key_does_not_block_plain_session_key() {
        let core = test_core().await;
        let (_h, _rx) = core.reserve("s1-summarize", "s1").await.unwrap();
        assert!(!core.is_session_busy("s1").await);
    }

    async fn test_core() -> AgentCore {
        use crate::session::memory::{InMemoryMessageService, InMemorySessionService};
        use crate::tools::registry::ToolRegistry;
        use forge_provider::{ChatMessage, ChatResponse};

        struct NullProvider;
        #[async_trait::async_trait]
        impl ChatProvider for NullProvider {
            async fn chat_with_tools(
                &self,
                _history: &[ChatMessage],
                _tools: Option<&[forge_provider::Tool]>,
            ) -> Result<ChatResponse, forge_provider::LLMError> {
                Ok(ChatResponse::default())
            }
        }

        let slot = ModelSlot {
            provider: Arc::new(NullProvider),
            info: ModelInfo::default(),
            provider_id: "test".into(),
            model_id: "test".into(),
        };
        let slot2 = ModelSlot {
            provider: Arc::new(NullProvider),
            info: ModelInfo::default(),
            provider_id: "test".into(),
            model_id: "test-small".into(),
        };

        AgentCore::new(
            Arc::new(EventBus::new()),
            Arc::new(PermissionBroker::new(Arc::new(EventBus::new()))),
            Arc::new(InMemorySessionService::new()),
            Arc::new(InMemoryMessageService::new()),
            Arc::new(ToolRegistry::new()),
            Config {
                large_model: crate::config::ModelSelection {
                    provider_id: "test".into(),
                    model_id: "test".into(),
                },
                small_model: crate::config::ModelSelection {
                    provider_id: "test".into(),
                    model_id: "test-small".into(),
                },
                providers: HashMap::new(),
                options: Default::default(),
            },
            slot,
            slot2,
        )
    }
}
