//! Event broker: typed pub/sub, best-effort in-process fan-out.
//!
//! Two delivery paths exist. `subscribe()` hands out a `broadcast::Receiver`:
//! lossy under backpressure, buffering up to a fixed bound and dropping the
//! oldest entry once full. `add_observer()` is for the handful of long-lived
//! sinks the engine itself depends on (the bridge to the storage services)
//! that must not silently drop events; each observer gets its own dispatch
//! task so one slow observer cannot block another or the publisher.

use crate::events::{AgentEvent, AgentEventKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex as TokioMutex, broadcast};
use tokio::task::JoinSet;

const CHANNEL_CAPACITY: usize = 1024;

#[async_trait]
pub trait EventObserver: Send + Sync {
    async fn on_event(&self, event: AgentEvent);
}

pub type ObserverToken = u64;

struct ObserverEntry {
    token: ObserverToken,
    observer: Arc<dyn EventObserver>,
}

pub struct EventBus {
    sender: broadcast::Sender<AgentEvent>,
    observers: Mutex<Vec<ObserverEntry>>,
    sequence: AtomicU64,
    observer_sequence: AtomicU64,
    observer_tasks: Arc<TokioMutex<JoinSet<()>>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            observers: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(0),
            observer_sequence: AtomicU64::new(0),
            observer_tasks: Arc::new(TokioMutex::new(JoinSet::new())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.sender.subscribe()
    }

    pub fn add_observer(&self, observer: Arc<dyn EventObserver>) -> ObserverToken {
        let token = self.observer_sequence.fetch_add(1, Ordering::SeqCst);
        self.observers.lock().push(ObserverEntry { token, observer });
        token
    }

    pub fn remove_observer(&self, token: ObserverToken) {
        self.observers.lock().retain(|e| e.token != token);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Publish a new event, stamping it with a fresh sequence number and the
    /// current time.
    pub fn publish(&self, session_id: Option<&str>, kind: AgentEventKind) {
        let event = AgentEvent {
            seq: self.sequence.fetch_add(1, Ordering::SeqCst),
            session_id: session_id.map(|s| s.to_string()),
            timestamp: time::OffsetDateTime::now_utc(),
            kind,
        };
        self.dispatch(event);
    }

    fn dispatch(&self, event: AgentEvent) {
        // Lossy broadcast: a full channel drops the oldest buffered event for
        // slow subscribers rather than blocking the publisher.
        let _ = self.sender.send(event.clone());

        let observers: Vec<_> = self.observers.lock().iter().map(|e| e.observer.clone()).collect();
        if observers.is_empty() {
            return;
        }

        let observer_tasks = self.observer_tasks.clone();
        tokio::spawn(async move {
            let mut tasks = observer_tasks.lock().await;
            for observer in observers {
                let event = event.clone();
                tasks.spawn(async move {
                    observer.on_event(event).await;
                });
            }
        });
    }

    /// Abort any in-flight observer dispatch tasks. Subscribers already
    /// holding a `broadcast::Receiver` simply see the sender dropped.
    pub async fn shutdown(&self) {
        self.observer_tasks.lock().await.abort_all();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
