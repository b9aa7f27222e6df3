//! Native filesystem notifications via `notify`.

use std::path::{Path, PathBuf};

use git2::Repository;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::{ChangeEventKind, EngineHandle};
use crate::error::WatchError;

/// Watches a working tree recursively and forwards changes to an engine.
///
/// Events inside `.git/` and on untracked paths covered by the
/// repository's ignore rules are dropped. Watching stops when this value
/// is dropped.
pub struct FsWatcher {
    _watcher: RecommendedWatcher,
    forward: JoinHandle<()>,
}

impl FsWatcher {
    pub fn start(root: &Path, engine: EngineHandle) -> Result<Self, WatchError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<notify::Event>>();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::WatchPath {
                path: root.to_path_buf(),
                source,
            })?;

        // Some platforms report canonical paths (e.g. /private/var on macOS).
        let mut roots = vec![root.to_path_buf()];
        if let Ok(canonical) = root.canonicalize() {
            if canonical.as_path() != root {
                roots.push(canonical);
            }
        }

        let ignore = IgnoreRules::open(root);

        let forward = tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                let event = match result {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("File watcher error: {}", e);
                        continue;
                    }
                };
                let Some(kind) = map_event_kind(&event.kind) else {
                    continue;
                };
                for path in &event.paths {
                    let Some(relative) = relative_path(&roots, path) else {
                        continue;
                    };
                    if ignore.is_ignored(&relative) {
                        continue;
                    }
                    engine.on_change_event(relative, kind);
                }
            }
            debug!("File watcher stopped");
        });

        debug!("Watching {}", root.display());
        Ok(Self {
            _watcher: watcher,
            forward,
        })
    }
}

impl Drop for FsWatcher {
    fn drop(&mut self) {
        self.forward.abort();
    }
}

/// The repository's ignore rules, consulted per event path.
struct IgnoreRules {
    repo: Option<Repository>,
}

impl IgnoreRules {
    fn open(root: &Path) -> Self {
        let repo = match Repository::open(root) {
            Ok(repo) => Some(repo),
            Err(e) => {
                debug!("No ignore rules for {}: {}", root.display(), e);
                None
            }
        };
        Self { repo }
    }

    /// Whether `relative` is ignored and not tracked.
    fn is_ignored(&self, relative: &str) -> bool {
        let Some(repo) = &self.repo else {
            return false;
        };
        let path = Path::new(relative);
        if !repo.is_path_ignored(path).unwrap_or(false) {
            return false;
        }
        // Force-added files stay visible.
        match repo.index() {
            Ok(index) => index.get_path(path, 0).is_none(),
            Err(_) => true,
        }
    }
}

/// Map a notify event kind onto a change kind; `None` for access and
/// other events that do not change content.
fn map_event_kind(kind: &EventKind) -> Option<ChangeEventKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeEventKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeEventKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeEventKind::Created),
        EventKind::Modify(_) => Some(ChangeEventKind::Modified),
        EventKind::Remove(_) => Some(ChangeEventKind::Deleted),
        EventKind::Any => Some(ChangeEventKind::Modified),
        EventKind::Access(_) | EventKind::Other => None,
    }
}

/// `path` relative to whichever root contains it, with `/` separators.
/// `None` for paths outside the roots, the root itself, and git metadata.
fn relative_path(roots: &[PathBuf], path: &Path) -> Option<String> {
    let relative = roots.iter().find_map(|root| path.strip_prefix(root).ok())?;
    let relative = relative.to_string_lossy().replace('\\', "/");

    if relative.is_empty() || relative == ".git" || relative.starts_with(".git/") {
        return None;
    }
    Some(relative)
}
