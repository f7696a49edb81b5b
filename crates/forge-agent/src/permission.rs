//! Permission broker: gates tool actions behind explicit or persistently
//! granted approval.

use crate::event_bus::EventBus;
use crate::events::AgentEventKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, oneshot};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub id: String,
    pub session_id: String,
    pub tool_call_id: String,
    pub tool_name: String,
    pub path: String,
    pub action: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// `(tool, action, path-prefix)` key for a session-scoped persistent grant.
/// A request matches a stored grant when its path is equal to, or a child
/// of, the grant's `path_prefix` — prefix matching under the session's
/// working directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GrantKey {
    tool: String,
    action: String,
}

struct SessionGrants {
    /// prefixes granted per (tool, action)
    prefixes: HashMap<GrantKey, Vec<String>>,
}

impl SessionGrants {
    fn new() -> Self {
        Self {
            prefixes: HashMap::new(),
        }
    }

    fn matches(&self, tool: &str, action: &str, path: &str) -> bool {
        let key = GrantKey {
            tool: tool.to_string(),
            action: action.to_string(),
        };
        self.prefixes
            .get(&key)
            .map(|prefixes| {
                prefixes
                    .iter()
                    .any(|p| path == p.as_str() || path.starts_with(&format!("{p}/")))
            })
            .unwrap_or(false)
    }

    fn add(&mut self, tool: &str, action: &str, path_prefix: &str) {
        let key = GrantKey {
            tool: tool.to_string(),
            action: action.to_string(),
        };
        self.prefixes
            .entry(key)
            .or_default()
            .push(path_prefix.to_string());
    }
}

struct Pending {
    response_tx: oneshot::Sender<bool>,
}

pub struct PermissionBroker {
    event_bus: Arc<EventBus>,
    pending: Mutex<HashMap<String, Pending>>,
    grants: Mutex<HashMap<String, SessionGrants>>,
    bypass: AtomicBool,
}

impl PermissionBroker {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            event_bus,
            pending: Mutex::new(HashMap::new()),
            grants: Mutex::new(HashMap::new()),
            bypass: AtomicBool::new(false),
        }
    }

    /// Yolo / bypass mode: every request resolves to granted immediately,
    /// and no event is published.
    pub fn set_bypass(&self, enabled: bool) {
        self.bypass.store(enabled, Ordering::SeqCst);
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass.load(Ordering::SeqCst)
    }

    /// `Request(req) -> bool`. Suspends the caller until resolved. A
    /// persistent grant short-circuits to `true` without creating a pending
    /// entry or publishing an event.
    pub async fn request(&self, req: PermissionRequest) -> bool {
        if self.bypass.load(Ordering::SeqCst) {
            return true;
        }

        if self
            .grants
            .lock()
            .await
            .get(&req.session_id)
            .map(|g| g.matches(&req.tool_name, &req.action, &req.path))
            .unwrap_or(false)
        {
            return true;
        }

        let (tx, rx) = oneshot::channel();
        let id = req.id.clone();
        self.pending
            .lock()
            .await
            .insert(id.clone(), Pending { response_tx: tx });

        self.event_bus.publish(
            Some(&req.session_id),
            AgentEventKind::PermissionRequested { request: req },
        );

        rx.await.unwrap_or(false)
    }

    fn resolve(&self, id: &str, granted: bool) -> impl std::future::Future<Output = ()> + '_ {
        let id = id.to_string();
        async move {
            let pending = self.pending.lock().await.remove(&id);
            if let Some(pending) = pending {
                let _ = pending.response_tx.send(granted);
            }
            self.event_bus.publish(
                None,
                AgentEventKind::PermissionResolved {
                    request_id: id,
                    granted,
                },
            );
        }
    }

    pub async fn grant(&self, request_id: &str) {
        self.resolve(request_id, true).await
    }

    pub async fn deny(&self, request_id: &str) {
        self.resolve(request_id, false).await
    }

    /// Grant this request and remember `(tool, action, path)` for the
    /// session so subsequent matching requests auto-grant.
    pub async fn grant_persistent(&self, req: &PermissionRequest) {
        self.grants
            .lock()
            .await
            .entry(req.session_id.clone())
            .or_insert_with(SessionGrants::new)
            .add(&req.tool_name, &req.action, &req.path);
        self.resolve(&req.id, true).await
    }

    /// Resolve every pending request to denied. Called when the broker (or
    /// the owning session) is torn down while requests are still pending.
    pub async fn deny_all_pending(&self) {
        let mut pending = self.pending.lock().await;
        for (id, entry) in pending.drain() {
            let _ = entry.response_tx.send(false);
            self.event_bus.publish(
                None,
                AgentEventKind::PermissionResolved {
                    request_id: id,
                    granted: false,
                },
            );
        }
    }
}
