//! The LSP workspace watcher is a process-wide singleton, keyed by
//! canonicalized root path: `watch_workspace` lazily creates one `Watcher`
//! per root and hands out the same `Arc` to every caller after that,
//! so re-registering the same directory never opens a second OS-level watch.

pub mod watcher;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;

pub use watcher::{ClientId, PreloadedFile, WatchKind, Watcher, WatchedPath};

static WORKSPACES: OnceLock<Mutex<HashMap<PathBuf, Arc<Watcher>>>> = OnceLock::new();

/// `WatchWorkspace(root)`. Returns the shared watcher for this root,
/// creating it (and its single OS-level recursive watch) on first call.
pub async fn watch_workspace(root: PathBuf) -> notify::Result<Arc<Watcher>> {
    let key = root.canonicalize().unwrap_or(root);
    let registry = WORKSPACES.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = registry.lock().await;
    if let Some(existing) = guard.get(&key) {
        return Ok(existing.clone());
    }
    let watcher = Arc::new(Watcher::new(key.clone())?);
    guard.insert(key, watcher.clone());
    Ok(watcher)
}
