//! Workspace file watcher: a single filesystem watch fanned out
//! to any number of registered clients, each masked to the event kinds it
//! asked for and scoped to the path patterns it registered under. Write/Create
//! events are debounced 300ms so an editor's save-flush or a build tool's
//! output doesn't flood a client with intermediate states; Delete is
//! delivered immediately, and a Rename is modeled as an immediate Delete of
//! the old path followed by a debounced Create of the new one.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

const DEBOUNCE: Duration = Duration::from_millis(300);

/// Files read eagerly at watch time rather than waiting for a client to ask
/// for them: skipped once they exceed this size.
const MAX_PRELOAD_BYTES: u64 = 1024 * 1024;

/// Opened unconditionally for every workspace, regardless of which clients
/// register — small enough to always be worth the read, and load-bearing
/// for dependency/module resolution in most language servers.
const HIGH_PRIORITY_CONFIG_FILES: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "go.mod",
    "go.sum",
    "tsconfig.json",
    "pyproject.toml",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchKind(u8);

impl WatchKind {
    pub const CREATE: WatchKind = WatchKind(1);
    pub const CHANGE: WatchKind = WatchKind(2);
    pub const DELETE: WatchKind = WatchKind(4);
    pub const ALL: WatchKind = WatchKind(7);

    pub fn contains(self, other: WatchKind) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for WatchKind {
    type Output = WatchKind;
    fn bitor(self, rhs: WatchKind) -> WatchKind {
        WatchKind(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone)]
pub struct WatchedPath {
    pub path: PathBuf,
    pub kind: WatchKind,
}

/// A file read into memory at registration or watch time, handed back to
/// the caller instead of waiting for the client to request it over the
/// wire.
#[derive(Debug, Clone)]
pub struct PreloadedFile {
    pub path: PathBuf,
    pub content: String,
}

pub type ClientId = u64;

struct Client {
    id: ClientId,
    /// The language-server name this client was registered under, e.g.
    /// `"gopls"` — used only for diagnostics, not for routing.
    #[allow(dead_code)]
    name: String,
    /// Workspace-relative roots this client's server declared a watch
    /// registration for. Empty means "the whole workspace" (a client that
    /// never narrowed its registration).
    patterns: Vec<PathBuf>,
    mask: WatchKind,
    sender: mpsc::UnboundedSender<WatchedPath>,
}

type PendingMap = Arc<Mutex<HashMap<PathBuf, JoinHandle<()>>>>;

/// One watcher per workspace root.
pub struct Watcher {
    clients: Arc<Mutex<Vec<Client>>>,
    next_id: AtomicU64,
    ignore_matcher: Arc<Gitignore>,
    config_files: Vec<PreloadedFile>,
    _inner: RecommendedWatcher,
}

impl Watcher {
    pub fn new(root: PathBuf) -> notify::Result<Self> {
        let clients: Arc<Mutex<Vec<Client>>> = Arc::new(Mutex::new(Vec::new()));
        let ignore_matcher = Arc::new(build_ignore_matcher(&root));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let config_files = preload_config_files(&root, &ignore_matcher);

        let clients_for_handler = clients.clone();
        let ignore_matcher_for_handler = ignore_matcher.clone();
        let mut inner = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else { return };
            handle_event(event, &clients_for_handler, &ignore_matcher_for_handler, &pending);
        })?;

        inner.watch(&root, RecursiveMode::Recursive)?;

        Ok(Self {
            clients,
            next_id: AtomicU64::new(0),
            ignore_matcher,
            config_files,
            _inner: inner,
        })
    }

    /// `RegisterWorkspaceWatcher(name, patterns, mask)`. `patterns` are the
    /// paths (workspace-relative or absolute, matching what `WatchWorkspace`
    /// was given) the server declared in its own watch registration; an
    /// event for a path outside all of them is never routed to this client.
    /// Returns, alongside the live event channel, every already-on-disk
    /// source file under those patterns worth preloading.
    pub async fn register(
        &self,
        name: impl Into<String>,
        patterns: Vec<PathBuf>,
        mask: WatchKind,
    ) -> (ClientId, mpsc::UnboundedReceiver<WatchedPath>, Vec<PreloadedFile>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        let preloaded = self.preload_patterns(&patterns);
        self.clients.lock().await.push(Client {
            id,
            name: name.into(),
            patterns,
            mask,
            sender: tx,
        });
        (id, rx, preloaded)
    }

    pub async fn unregister(&self, id: ClientId) {
        self.clients.lock().await.retain(|c| c.id != id);
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Config files preloaded once at watch time, independent of any
    /// client registration.
    pub fn config_files(&self) -> &[PreloadedFile] {
        &self.config_files
    }

    fn preload_patterns(&self, patterns: &[PathBuf]) -> Vec<PreloadedFile> {
        let mut out = Vec::new();
        for pattern in patterns {
            let walker = WalkBuilder::new(pattern).hidden(false).build();
            for entry in walker.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                if self.ignore_matcher.matched(path, false).is_ignore() {
                    continue;
                }
                let Ok(metadata) = entry.metadata() else {
                    continue;
                };
                if metadata.len() > MAX_PRELOAD_BYTES {
                    continue;
                }
                if let Ok(content) = std::fs::read_to_string(path) {
                    out.push(PreloadedFile {
                        path: path.to_path_buf(),
                        content,
                    });
                }
            }
        }
        out
    }
}

fn preload_config_files(root: &Path, ignore_matcher: &Gitignore) -> Vec<PreloadedFile> {
    let mut out = Vec::new();
    for name in HIGH_PRIORITY_CONFIG_FILES {
        let path = root.join(name);
        if !path.is_file() || ignore_matcher.matched(&path, false).is_ignore() {
            continue;
        }
        let Ok(metadata) = std::fs::metadata(&path) else {
            continue;
        };
        if metadata.len() > MAX_PRELOAD_BYTES {
            continue;
        }
        if let Ok(content) = std::fs::read_to_string(&path) {
            out.push(PreloadedFile { path, content });
        }
    }
    out
}

fn handle_event(
    event: Event,
    clients: &Arc<Mutex<Vec<Client>>>,
    ignore_matcher: &Arc<Gitignore>,
    pending: &PendingMap,
) {
    // A rename reported as `From` + `To` on the same event: delete the old
    // path now, debounce a create on the new one.
    if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = event.kind {
        if let [from, to] = event.paths.as_slice() {
            schedule(from.clone(), WatchKind::DELETE, true, clients, ignore_matcher, pending);
            schedule(to.clone(), WatchKind::CREATE, false, clients, ignore_matcher, pending);
        }
        return;
    }

    let (kind, immediate) = match event.kind {
        EventKind::Create(_) => (WatchKind::CREATE, false),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => (WatchKind::DELETE, true),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => (WatchKind::CREATE, false),
        EventKind::Modify(_) => (WatchKind::CHANGE, false),
        EventKind::Remove(_) => (WatchKind::DELETE, true),
        _ => return,
    };

    for path in event.paths {
        schedule(path, kind, immediate, clients, ignore_matcher, pending);
    }
}

fn schedule(
    path: PathBuf,
    kind: WatchKind,
    immediate: bool,
    clients: &Arc<Mutex<Vec<Client>>>,
    ignore_matcher: &Arc<Gitignore>,
    pending: &PendingMap,
) {
    if ignore_matcher.matched(&path, path.is_dir()).is_ignore() {
        return;
    }

    let clients = clients.clone();
    let pending = pending.clone();

    tokio::spawn(async move {
        if immediate {
            dispatch(&clients, WatchedPath { path, kind }).await;
            return;
        }

        let mut pending_guard = pending.lock().await;
        if let Some(existing) = pending_guard.remove(&path) {
            existing.abort();
        }
        let clients2 = clients.clone();
        let path2 = path.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(DEBOUNCE).await;
            dispatch(&clients2, WatchedPath { path: path2, kind }).await;
        });
        pending_guard.insert(path, handle);
    });
}

async fn dispatch(clients: &Arc<Mutex<Vec<Client>>>, event: WatchedPath) {
    let clients = clients.lock().await;
    for client in clients.iter() {
        if !client.mask.contains(event.kind) {
            continue;
        }
        if !client.patterns.is_empty() && !client.patterns.iter().any(|p| event.path.starts_with(p)) {
            continue;
        }
        let _ = client.sender.send(WatchedPath {
            path: event.path.clone(),
            kind: event.kind,
        });
    }
}

fn build_ignore_matcher(root: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    let _ = builder.add(root.join(".gitignore"));
    let _ = builder.add(root.join(".crushignore"));
    builder.build().unwrap_or_else(|_| Gitignore::empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_contains_is_bitwise() {
        let mask = WatchKind::CREATE | WatchKind::DELETE;
        assert!(mask.contains(WatchKind::CREATE));
        assert!(mask.contains(WatchKind::DELETE));
        assert!(!mask.contains(WatchKind::CHANGE));
    }

    #[test]
    fn all_contains_every_kind() {
        assert!(WatchKind::ALL.contains(WatchKind::CREATE));
        assert!(WatchKind::ALL.contains(WatchKind::CHANGE));
        assert!(WatchKind::ALL.contains(WatchKind::DELETE));
    }

    #[tokio::test]
    async fn register_and_unregister_changes_client_count() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = Watcher::new(dir.path().to_path_buf()).unwrap();
        let (id, _rx, _preloaded) = watcher.register("gopls", vec![], WatchKind::ALL).await;
        assert_eq!(watcher.client_count().await, 1);
        watcher.unregister(id).await;
        assert_eq!(watcher.client_count().await, 0);
    }

    #[tokio::test]
    async fn config_files_at_the_workspace_root_are_preloaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"x\"").unwrap();
        let watcher = Watcher::new(dir.path().to_path_buf()).unwrap();
        assert!(watcher.config_files().iter().any(|f| f.path.ends_with("Cargo.toml")));
    }

    #[tokio::test]
    async fn oversized_files_are_not_preloaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "x".repeat((MAX_PRELOAD_BYTES as usize) + 1)).unwrap();
        let watcher = Watcher::new(dir.path().to_path_buf()).unwrap();
        assert!(!watcher.config_files().iter().any(|f| f.path.ends_with("Cargo.toml")));
    }

    #[tokio::test]
    async fn registering_with_patterns_preloads_matching_source_files() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("pkg");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("a.go"), "package pkg").unwrap();
        std::fs::write(dir.path().join("index.ts"), "export {}").unwrap();

        let watcher = Watcher::new(dir.path().to_path_buf()).unwrap();
        let (_id, _rx, preloaded) = watcher.register("gopls", vec![pkg.clone()], WatchKind::ALL).await;

        assert!(preloaded.iter().any(|f| f.path.ends_with("a.go")));
        assert!(!preloaded.iter().any(|f| f.path.ends_with("index.ts")));
    }
}
