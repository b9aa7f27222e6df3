//! Periodic `git status` polling.
//!
//! Catches changes the native watcher misses, e.g. on network mounts or
//! when another tool rewrites the index.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::engine::{ChangeEvent, ChangeEventKind, EngineHandle};
use crate::git::{RepoStatusEntry, VcsBackend};

/// Path → two-character status code.
type Snapshot = HashMap<String, String>;

pub struct StatusPoller {
    backend: Arc<dyn VcsBackend>,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(backend: Arc<dyn VcsBackend>, interval: Duration) -> Self {
        Self { backend, interval }
    }

    /// Poll until the returned task is aborted.
    ///
    /// The first poll reports every change already present in the tree.
    pub fn spawn(self, engine: EngineHandle) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut previous = Snapshot::new();

            loop {
                ticker.tick().await;
                let entries = match self.backend.status().await {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!("Status poll failed: {}", e);
                        continue;
                    }
                };

                let current = snapshot(&entries);
                for event in diff_snapshots(&previous, &current) {
                    debug!("Poll saw {:?} {}", event.kind, event.path);
                    engine.on_change_event(event.path, event.kind);
                }
                previous = current;
            }
        })
    }
}

fn snapshot(entries: &[RepoStatusEntry]) -> Snapshot {
    entries
        .iter()
        .map(|e| (e.path.clone(), e.code()))
        .collect()
}

/// Events for entries that are new in `current` or whose code changed.
///
/// Entries that vanished were committed or reverted, so they produce no
/// event.
fn diff_snapshots(previous: &Snapshot, current: &Snapshot) -> Vec<ChangeEvent> {
    let mut events: Vec<ChangeEvent> = current
        .iter()
        .filter(|(path, code)| previous.get(*path) != Some(*code))
        .map(|(path, code)| ChangeEvent::new(path.clone(), event_kind(code)))
        .collect();
    events.sort_by(|a, b| a.path.cmp(&b.path));
    events
}

fn event_kind(code: &str) -> ChangeEventKind {
    if code.contains('D') {
        ChangeEventKind::Deleted
    } else if code == "??" || code.starts_with('A') {
        ChangeEventKind::Created
    } else {
        ChangeEventKind::Modified
    }
}
