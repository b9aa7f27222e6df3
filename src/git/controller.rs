//! One stage → commit → push cycle against the live repository.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{BackendError, CycleError};
use crate::exclude::ExclusionMatcher;
use crate::git::backend::{IndexUpdate, VcsBackend};
use crate::git::status::{ClassifiedChange, RepoStatusEntry};
use crate::message::{CommitMessageGenerator, sanitize_commit_message};

/// Result of one commit cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub committed: bool,
    pub pushed: bool,
    pub message: String,
    pub error: Option<CycleError>,
    pub commit_id: Option<String>,
    /// Number of changes described by the commit message.
    pub files: usize,
    /// Paths that could not be staged and were left out.
    pub skipped_paths: Vec<String>,
    pub finished_at: DateTime<Utc>,
}

impl CommitOutcome {
    fn stopped(error: CycleError) -> Self {
        Self {
            committed: false,
            pushed: false,
            message: String::new(),
            error: Some(error),
            commit_id: None,
            files: 0,
            skipped_paths: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    /// Whether the cycle ended without doing anything and without error.
    pub fn is_noop(&self) -> bool {
        matches!(self.error, Some(CycleError::NothingToCommit))
    }

    /// Whether the cycle ended in a failure worth showing the user.
    pub fn is_failure(&self) -> bool {
        self.error.as_ref().is_some_and(CycleError::is_failure)
    }

    /// One-line description for UI feedback.
    pub fn summary(&self) -> String {
        match (&self.error, self.committed, self.pushed) {
            (Some(CycleError::NothingToCommit), _, _) => "No changes to commit".to_string(),
            (None, true, true) => format!("Committed and pushed: \"{}\"", self.message),
            (None, true, false) => format!("Committed: \"{}\"", self.message),
            (Some(e), true, _) => format!("Committed \"{}\" but {}", self.message, e),
            (Some(e), false, _) => e.to_string(),
            (None, false, _) => "Nothing happened".to_string(),
        }
    }
}

/// Knobs for a commit cycle.
#[derive(Debug, Clone)]
pub struct CycleOptions {
    pub include_untracked: bool,
    pub exclude: ExclusionMatcher,
    pub push: bool,
    pub remote: String,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            include_untracked: true,
            exclude: ExclusionMatcher::default(),
            push: true,
            remote: "origin".to_string(),
        }
    }
}

/// Drives the version-control backend through one commit cycle.
///
/// Holds no state between cycles: every run starts from the live
/// repository status.
pub struct RepositoryController {
    backend: Arc<dyn VcsBackend>,
    messages: CommitMessageGenerator,
    options: CycleOptions,
}

impl RepositoryController {
    pub fn new(
        backend: Arc<dyn VcsBackend>,
        messages: CommitMessageGenerator,
        options: CycleOptions,
    ) -> Self {
        Self {
            backend,
            messages,
            options,
        }
    }

    pub fn options(&self) -> &CycleOptions {
        &self.options
    }

    /// Run one cycle.
    ///
    /// Steps that succeeded before a failure are not rolled back: a commit
    /// whose push fails stays in local history and is pushed by a later
    /// cycle.
    pub async fn run_cycle(&self) -> CommitOutcome {
        if !self.backend.is_repository().await {
            warn!("Working directory is not a git repository");
            return CommitOutcome::stopped(CycleError::NotARepository);
        }

        let entries = match self.backend.status().await {
            Ok(entries) => entries,
            Err(e) => return CommitOutcome::stopped(CycleError::StatusFailed(e.to_string())),
        };
        if entries.is_empty() {
            debug!("No changes to commit");
            return CommitOutcome::stopped(CycleError::NothingToCommit);
        }

        let (staged, skipped_paths) = self.stage_entries(&entries).await;

        match self.commit_candidates().await {
            Ok(paths) if paths.is_empty() => {
                debug!("Nothing staged after filtering");
                let mut outcome = CommitOutcome::stopped(CycleError::NothingToCommit);
                outcome.skipped_paths = skipped_paths;
                return outcome;
            }
            Ok(_) => {}
            Err(error) => return CommitOutcome::stopped(error),
        }

        // The message only describes what this cycle staged.
        let changes: Vec<ClassifiedChange> = staged.iter().map(|e| e.classify()).collect();
        let message = sanitize_commit_message(&self.messages.generate(&changes).await);

        let mut outcome = CommitOutcome {
            committed: false,
            pushed: false,
            message,
            error: None,
            commit_id: None,
            files: changes.len(),
            skipped_paths,
            finished_at: Utc::now(),
        };

        match self.backend.commit(&outcome.message).await {
            Ok(id) => {
                info!("Committed {}: {}", short_id(&id), outcome.message);
                outcome.committed = true;
                outcome.commit_id = Some(id);
            }
            Err(e) => {
                warn!("Commit failed: {}", e);
                outcome.error = Some(CycleError::CommitFailed(e.to_string()));
                outcome.finished_at = Utc::now();
                return outcome;
            }
        }

        match self.publish().await {
            Ok(pushed) => outcome.pushed = pushed,
            Err(error) => outcome.error = Some(error),
        }

        outcome.finished_at = Utc::now();
        outcome
    }

    /// Stage or remove every eligible entry in one index update; returns
    /// the entries that made it into the index and the paths that failed.
    async fn stage_entries(
        &self,
        entries: &[RepoStatusEntry],
    ) -> (Vec<RepoStatusEntry>, Vec<String>) {
        let mut eligible = Vec::new();
        for entry in entries {
            if self.options.exclude.is_excluded(&entry.path) {
                debug!("Excluding {}", entry.path);
                continue;
            }
            if entry.is_untracked() && !self.options.include_untracked {
                debug!("Leaving untracked {}", entry.path);
                continue;
            }
            eligible.push(entry);
        }

        let updates: Vec<IndexUpdate> = eligible
            .iter()
            .map(|entry| {
                if entry.is_removal() {
                    IndexUpdate::Remove(entry.path.clone())
                } else {
                    IndexUpdate::Add(entry.path.clone())
                }
            })
            .collect();

        let failed: Vec<String> = match self.backend.stage_paths(&updates).await {
            Ok(failures) => failures
                .into_iter()
                .map(|failure| {
                    warn!("Skipping {}: {}", failure.path, failure.error);
                    failure.path
                })
                .collect(),
            Err(e) => {
                warn!("Failed to update the index: {}", e);
                updates.iter().map(|u| u.path().to_string()).collect()
            }
        };

        let staged = eligible
            .into_iter()
            .filter(|entry| !failed.contains(&entry.path))
            .cloned()
            .collect();
        (staged, failed)
    }

    /// Staged paths that may be committed.
    ///
    /// The index can hold entries staged outside this cycle. Excluded ones
    /// are reset to HEAD here so the commit never records them.
    async fn commit_candidates(&self) -> Result<Vec<String>, CycleError> {
        let staged = self
            .backend
            .staged_paths()
            .await
            .map_err(|e| CycleError::StatusFailed(e.to_string()))?;

        let (excluded, included): (Vec<String>, Vec<String>) = staged
            .into_iter()
            .partition(|path| self.options.exclude.is_excluded(path));

        if !excluded.is_empty() {
            debug!("Unstaging excluded {}", excluded.join(", "));
            if let Err(e) = self.backend.unstage(&excluded).await {
                warn!("Failed to unstage excluded paths: {}", e);
                return Err(CycleError::CommitFailed(format!(
                    "could not unstage excluded paths: {e}"
                )));
            }
        }

        Ok(included)
    }

    /// Push if enabled and the remote exists. `Ok(false)` means skipped.
    async fn publish(&self) -> Result<bool, CycleError> {
        if !self.options.push {
            return Ok(false);
        }
        if !self.backend.has_remote(&self.options.remote).await {
            info!("Remote '{}' not configured, skipping push", self.options.remote);
            return Ok(false);
        }

        match self.backend.push(&self.options.remote).await {
            Ok(()) => {
                info!("Pushed to {}", self.options.remote);
                Ok(true)
            }
            Err(e) => {
                let error = classify_push_error(&e);
                warn!("{}", error);
                Err(error)
            }
        }
    }
}

static AUTH_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)authentication failed|could not read (username|password)|permission denied \(publickey|terminal prompts disabled|invalid username or password|returned error: 40[13]|access denied",
    )
    .expect("auth failure pattern is valid")
});

static REJECTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[rejected\]|\[remote rejected\]|non-fast-forward|fetch first|updates were rejected")
        .expect("rejection pattern is valid")
});

/// Map a raw push failure onto the user-facing taxonomy.
pub fn classify_push_error(error: &BackendError) -> CycleError {
    let text = match error {
        BackendError::Command { stderr, .. } => stderr.clone(),
        other => other.to_string(),
    };

    if AUTH_FAILURE.is_match(&text) {
        CycleError::AuthenticationFailed(text)
    } else if REJECTED.is_match(&text) {
        CycleError::PushRejected(text)
    } else {
        CycleError::PushFailed(text)
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::fake::FakeBackend;

    fn controller(backend: &Arc<FakeBackend>, options: CycleOptions) -> RepositoryController {
        RepositoryController::new(
            Arc::clone(backend) as Arc<dyn VcsBackend>,
            CommitMessageGenerator::fallback_only(),
            options,
        )
    }

    fn local_only() -> CycleOptions {
        CycleOptions {
            push: false,
            ..CycleOptions::default()
        }
    }

    #[tokio::test]
    async fn test_not_a_repository() {
        let backend = Arc::new(FakeBackend::not_a_repository());
        let outcome = controller(&backend, local_only()).run_cycle().await;
        assert_eq!(outcome.error, Some(CycleError::NotARepository));
        assert!(!outcome.committed);
    }

    #[tokio::test]
    async fn test_clean_tree_is_nothing_to_commit() {
        let backend = Arc::new(FakeBackend::new(&[]));
        let outcome = controller(&backend, local_only()).run_cycle().await;
        assert!(outcome.is_noop());
        assert!(backend.commits().is_empty());
    }

    #[tokio::test]
    async fn test_commits_with_fallback_message() {
        let backend = Arc::new(FakeBackend::new(&[("a.txt", "??"), ("b.txt", " M"), ("c.txt", " D")]));
        let outcome = controller(&backend, local_only()).run_cycle().await;

        assert!(outcome.committed);
        assert!(!outcome.pushed);
        assert_eq!(outcome.error, None);
        assert_eq!(outcome.files, 3);
        assert_eq!(
            outcome.message,
            "Auto-commit: 1 added, 1 modified, 1 deleted files"
        );
        assert_eq!(backend.commits(), vec![outcome.message.clone()]);
    }

    #[tokio::test]
    async fn test_second_cycle_has_nothing_to_commit() {
        let backend = Arc::new(FakeBackend::new(&[("a.txt", "??")]));
        let controller = controller(&backend, local_only());
        assert!(controller.run_cycle().await.committed);

        let second = controller.run_cycle().await;
        assert_eq!(second.error, Some(CycleError::NothingToCommit));
        assert_eq!(backend.commits().len(), 1);
    }

    #[tokio::test]
    async fn test_excluded_and_untracked_paths_are_left_alone() {
        let backend = Arc::new(FakeBackend::new(&[("debug.log", "??"), ("notes.txt", "??"), ("src/lib.rs", " M")]));
        let options = CycleOptions {
            include_untracked: false,
            exclude: ExclusionMatcher::new(&["*.log"]),
            ..local_only()
        };
        let outcome = controller(&backend, options).run_cycle().await;

        assert!(outcome.committed);
        assert_eq!(outcome.message, "Auto-commit: 1 modified file");
        let remaining: Vec<String> = backend.state.lock().unwrap().status.iter().map(|e| e.path.clone()).collect();
        assert_eq!(remaining, vec!["debug.log".to_string(), "notes.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_only_excluded_changes_is_nothing_to_commit() {
        let backend = Arc::new(FakeBackend::new(&[("debug.log", "??")]));
        let options = CycleOptions {
            exclude: ExclusionMatcher::new(&["*.log"]),
            ..local_only()
        };
        let outcome = controller(&backend, options).run_cycle().await;
        assert!(outcome.is_noop());
        assert!(backend.commits().is_empty());
    }

    #[tokio::test]
    async fn test_prestaged_excluded_path_is_unstaged() {
        let backend = Arc::new(FakeBackend::new(&[("app.txt", " M")]));
        backend.prestage("debug.log", "A ");
        let options = CycleOptions {
            exclude: ExclusionMatcher::new(&["*.log"]),
            ..local_only()
        };

        let outcome = controller(&backend, options).run_cycle().await;

        assert!(outcome.committed);
        assert_eq!(outcome.message, "Auto-commit: 1 modified file");
        let state = backend.state.lock().unwrap();
        assert_eq!(state.committed_paths, vec![vec!["app.txt".to_string()]]);
    }

    #[tokio::test]
    async fn test_only_prestaged_excluded_path_is_nothing_to_commit() {
        let backend = Arc::new(FakeBackend::new(&[]));
        backend.prestage("debug.log", "A ");
        let options = CycleOptions {
            exclude: ExclusionMatcher::new(&["*.log"]),
            ..local_only()
        };

        let outcome = controller(&backend, options).run_cycle().await;

        assert_eq!(outcome.error, Some(CycleError::NothingToCommit));
        assert!(backend.commits().is_empty());
        assert!(backend.state.lock().unwrap().staged.is_empty());
    }

    #[tokio::test]
    async fn test_unstageable_path_is_skipped() {
        let backend = Arc::new(FakeBackend::new(&[("locked.bin", "??"), ("ok.txt", "??")]));
        backend.state.lock().unwrap().unstageable.insert("locked.bin".to_string());

        let outcome = controller(&backend, local_only()).run_cycle().await;
        assert!(outcome.committed);
        assert_eq!(outcome.skipped_paths, vec!["locked.bin".to_string()]);
        assert_eq!(outcome.message, "Auto-commit: 1 added file");
    }

    #[tokio::test]
    async fn test_commit_failure_is_reported() {
        let backend = Arc::new(FakeBackend::new(&[("a.txt", "??")]));
        backend.state.lock().unwrap().commit_error = Some("Please tell me who you are".to_string());

        let outcome = controller(&backend, local_only()).run_cycle().await;
        assert!(!outcome.committed);
        assert!(matches!(outcome.error, Some(CycleError::CommitFailed(_))));
    }

    #[tokio::test]
    async fn test_push_skipped_without_remote() {
        let backend = Arc::new(FakeBackend::new(&[("a.txt", "??")]));
        let outcome = controller(&backend, CycleOptions::default()).run_cycle().await;
        assert!(outcome.committed);
        assert!(!outcome.pushed);
        assert_eq!(outcome.error, None);
    }

    #[tokio::test]
    async fn test_push_after_commit() {
        let backend = Arc::new(FakeBackend::new(&[("a.txt", "??")]));
        backend.state.lock().unwrap().remote = true;

        let outcome = controller(&backend, CycleOptions::default()).run_cycle().await;
        assert!(outcome.committed && outcome.pushed);
        assert_eq!(backend.state.lock().unwrap().pushes, 1);
    }

    #[tokio::test]
    async fn test_rejected_push_keeps_commit() {
        let backend = Arc::new(FakeBackend::new(&[("a.txt", "??")]));
        {
            let mut state = backend.state.lock().unwrap();
            state.remote = true;
            state.push_error = Some(" ! [rejected] main -> main (non-fast-forward)".to_string());
        }

        let outcome = controller(&backend, CycleOptions::default()).run_cycle().await;
        assert!(outcome.committed);
        assert!(!outcome.pushed);
        assert!(matches!(outcome.error, Some(CycleError::PushRejected(_))));
        assert!(outcome.is_failure());
    }

    fn push_error(stderr: &str) -> BackendError {
        BackendError::Command {
            operation: "push".to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_classify_authentication_failures() {
        for stderr in [
            "remote: Invalid username or password.\nfatal: Authentication failed for 'https://github.com/o/r.git/'",
            "fatal: could not read Username for 'https://github.com': terminal prompts disabled",
            "git@github.com: Permission denied (publickey).\nfatal: Could not read from remote repository.",
        ] {
            assert!(
                matches!(classify_push_error(&push_error(stderr)), CycleError::AuthenticationFailed(_)),
                "{stderr}"
            );
        }
    }

    #[test]
    fn test_classify_rejections() {
        let stderr = " ! [rejected]        main -> main (fetch first)\nerror: failed to push some refs to 'origin'";
        assert!(matches!(
            classify_push_error(&push_error(stderr)),
            CycleError::PushRejected(_)
        ));

        let stderr = " ! [remote rejected] main -> main (protected branch hook declined)";
        assert!(matches!(
            classify_push_error(&push_error(stderr)),
            CycleError::PushRejected(_)
        ));
    }

    #[test]
    fn test_classify_other_push_failures() {
        let stderr = "fatal: unable to access 'https://example.invalid/': Could not resolve host";
        assert!(matches!(
            classify_push_error(&push_error(stderr)),
            CycleError::PushFailed(_)
        ));
    }

    #[test]
    fn test_summary_wording() {
        let mut outcome = CommitOutcome::stopped(CycleError::NothingToCommit);
        assert!(outcome.is_noop());
        assert!(!outcome.is_failure());
        assert_eq!(outcome.summary(), "No changes to commit");

        outcome.error = None;
        outcome.committed = true;
        outcome.message = "feat: x".to_string();
        assert_eq!(outcome.summary(), "Committed: \"feat: x\"");

        outcome.error = Some(CycleError::PushRejected("rejected".to_string()));
        assert!(outcome.is_failure());
        assert!(outcome.summary().starts_with("Committed \"feat: x\" but Push rejected"));
    }
}
