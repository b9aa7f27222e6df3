//! Version-control backend: the operations a commit cycle needs.
//!
//! Local operations go through git2 on tokio's blocking pool, so a slow
//! status scan never stalls the engine. Push shells out to the system
//! `git` binary so it inherits the user's credential helpers and SSH agent.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use git2::{ErrorCode, IndexAddOption, ObjectType, Repository, StatusOptions, Tree};
use tokio::process::Command;
use tracing::debug;

use crate::error::BackendError;
use crate::git::status::RepoStatusEntry;

/// One index change requested by a commit cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexUpdate {
    /// Add the path's current content.
    Add(String),
    /// Record the path's deletion.
    Remove(String),
}

impl IndexUpdate {
    pub fn path(&self) -> &str {
        match self {
            IndexUpdate::Add(path) | IndexUpdate::Remove(path) => path,
        }
    }
}

/// A path the index refused; the rest of the batch is kept.
#[derive(Debug)]
pub struct StageFailure {
    pub path: String,
    pub error: BackendError,
}

/// Operations the repository controller drives.
///
/// Implementations must be cheap to share across tasks; the controller
/// holds them behind an `Arc`.
#[async_trait]
pub trait VcsBackend: Send + Sync {
    /// Whether the working directory is a git repository.
    async fn is_repository(&self) -> bool;

    /// Live status of every changed, non-ignored path.
    async fn status(&self) -> Result<Vec<RepoStatusEntry>, BackendError>;

    /// Apply `updates` to the index and write it once.
    ///
    /// A path that cannot be staged is reported in the returned list and
    /// does not stop the others. `Err` means the index itself could not be
    /// read or written.
    async fn stage_paths(&self, updates: &[IndexUpdate]) -> Result<Vec<StageFailure>, BackendError>;

    /// Stage every change, including deletions (`git add -A`).
    async fn stage_all(&self) -> Result<(), BackendError>;

    /// Reset the index entries of `paths` to HEAD (`git reset -- <paths>`).
    async fn unstage(&self, paths: &[String]) -> Result<(), BackendError>;

    /// Paths whose index state differs from HEAD.
    async fn staged_paths(&self) -> Result<Vec<String>, BackendError>;

    /// Commit the index and return the new commit id.
    async fn commit(&self, message: &str) -> Result<String, BackendError>;

    /// Whether a remote with this name is configured.
    async fn has_remote(&self, remote: &str) -> bool;

    /// Push the current branch to `remote`.
    async fn push(&self, remote: &str) -> Result<(), BackendError>;
}

/// git2-backed implementation rooted at a working directory.
#[derive(Debug, Clone)]
pub struct GitBackend {
    workdir: PathBuf,
}

impl GitBackend {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Locate the repository containing `path` and root the backend at its
    /// working directory.
    pub fn discover(path: &Path) -> Result<Self, BackendError> {
        let repo = Repository::discover(path)?;
        let workdir = repo.workdir().ok_or(BackendError::BareRepository)?;
        Ok(Self::new(workdir))
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Open the repository on the blocking pool and run `f` against it.
    async fn with_repo<T, F>(&self, f: F) -> Result<T, BackendError>
    where
        T: Send + 'static,
        F: FnOnce(&Repository) -> Result<T, BackendError> + Send + 'static,
    {
        let workdir = self.workdir.clone();
        tokio::task::spawn_blocking(move || {
            let repo = Repository::open(&workdir)?;
            f(&repo)
        })
        .await?
    }
}

#[async_trait]
impl VcsBackend for GitBackend {
    async fn is_repository(&self) -> bool {
        self.with_repo(|repo| Ok(!repo.is_bare()))
            .await
            .unwrap_or(false)
    }

    async fn status(&self) -> Result<Vec<RepoStatusEntry>, BackendError> {
        self.with_repo(|repo| {
            let mut opts = StatusOptions::new();
            opts.include_untracked(true)
                .recurse_untracked_dirs(true)
                .include_ignored(false)
                .renames_head_to_index(true);

            let statuses = repo.statuses(Some(&mut opts))?;
            Ok(statuses
                .iter()
                .filter_map(|entry| RepoStatusEntry::from_git2(&entry))
                .collect())
        })
        .await
    }

    async fn stage_paths(&self, updates: &[IndexUpdate]) -> Result<Vec<StageFailure>, BackendError> {
        let updates = updates.to_vec();
        self.with_repo(move |repo| {
            let mut index = repo.index()?;
            let mut failures = Vec::new();

            for update in updates {
                let result = match &update {
                    IndexUpdate::Add(path) => index.add_path(Path::new(path)),
                    IndexUpdate::Remove(path) => index.remove_path(Path::new(path)),
                };
                if let Err(e) = result {
                    failures.push(StageFailure {
                        path: update.path().to_string(),
                        error: e.into(),
                    });
                }
            }

            index.write()?;
            Ok(failures)
        })
        .await
    }

    async fn stage_all(&self) -> Result<(), BackendError> {
        self.with_repo(|repo| {
            let mut index = repo.index()?;
            index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
            index.update_all(["*"].iter(), None)?;
            index.write()?;
            Ok(())
        })
        .await
    }

    async fn unstage(&self, paths: &[String]) -> Result<(), BackendError> {
        if paths.is_empty() {
            return Ok(());
        }
        let paths = paths.to_vec();
        self.with_repo(move |repo| {
            // On an unborn branch there is nothing to reset to; the entries
            // are dropped from the index instead.
            let target = match repo.head() {
                Ok(head) => Some(head.peel(ObjectType::Commit)?),
                Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                    None
                }
                Err(e) => return Err(e.into()),
            };
            repo.reset_default(target.as_ref(), paths)?;
            Ok(())
        })
        .await
    }

    async fn staged_paths(&self) -> Result<Vec<String>, BackendError> {
        self.with_repo(|repo| {
            let head_tree = resolve_head_tree(repo)?;
            let diff = repo.diff_tree_to_index(head_tree.as_ref(), None, None)?;

            Ok(diff
                .deltas()
                .filter_map(|delta| {
                    delta
                        .new_file()
                        .path()
                        .or_else(|| delta.old_file().path())
                        .map(|p| p.to_string_lossy().to_string())
                })
                .collect())
        })
        .await
    }

    async fn commit(&self, message: &str) -> Result<String, BackendError> {
        let message = message.to_string();
        self.with_repo(move |repo| {
            let mut index = repo.index()?;
            let tree_id = index.write_tree()?;
            let tree = repo.find_tree(tree_id)?;
            let sig = repo.signature()?;

            let parent = match repo.head() {
                Ok(head) => Some(head.peel_to_commit()?),
                Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                    None
                }
                Err(e) => return Err(e.into()),
            };
            let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

            let oid = repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &parents)?;
            debug!("Created commit {}", oid);
            Ok(oid.to_string())
        })
        .await
    }

    async fn has_remote(&self, remote: &str) -> bool {
        let remote = remote.to_string();
        self.with_repo(move |repo| Ok(repo.find_remote(&remote).is_ok()))
            .await
            .unwrap_or(false)
    }

    async fn push(&self, remote: &str) -> Result<(), BackendError> {
        let output = Command::new("git")
            .args(["push", remote, "HEAD"])
            .current_dir(&self.workdir)
            // Fail instead of blocking on an interactive credential prompt.
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| BackendError::Spawn {
                operation: "push".to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(BackendError::Command {
                operation: "push".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Resolve the HEAD tree; `None` for a repository with no commits yet.
fn resolve_head_tree(repo: &Repository) -> Result<Option<Tree<'_>>, BackendError> {
    let head = match repo.head() {
        Ok(r) => r,
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Some(head.peel_to_tree()?))
}
