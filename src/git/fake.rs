//! In-memory backend for unit tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::BackendError;
use crate::git::backend::{IndexUpdate, StageFailure, VcsBackend};
use crate::git::status::RepoStatusEntry;

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub status: Vec<RepoStatusEntry>,
    pub staged: Vec<String>,
    pub unstageable: HashSet<String>,
    pub commit_error: Option<String>,
    pub remote: bool,
    pub push_error: Option<String>,
    pub commits: Vec<String>,
    /// Paths captured by each commit, in commit order.
    pub committed_paths: Vec<Vec<String>>,
    pub pushes: usize,
}

/// Backend whose working tree is a list of status entries.
///
/// Committing clears the entries that were staged, so a second cycle
/// sees a clean tree.
#[derive(Debug)]
pub(crate) struct FakeBackend {
    pub repository: bool,
    pub state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new(status: &[(&str, &str)]) -> Self {
        let status = status
            .iter()
            .map(|(path, code)| RepoStatusEntry::new(*path, code))
            .collect();
        Self {
            repository: true,
            state: Mutex::new(FakeState {
                status,
                ..FakeState::default()
            }),
        }
    }

    pub fn not_a_repository() -> Self {
        Self {
            repository: false,
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Simulate a file change landing in the working tree.
    pub fn touch(&self, path: &str, code: &str) {
        let mut state = self.state.lock().unwrap();
        state.status.retain(|e| e.path != path);
        state.status.push(RepoStatusEntry::new(path, code));
    }

    pub fn commits(&self) -> Vec<String> {
        self.state.lock().unwrap().commits.clone()
    }

    /// Simulate a path the user staged before the cycle ran.
    pub fn prestage(&self, path: &str, code: &str) {
        self.touch(path, code);
        self.state.lock().unwrap().staged.push(path.to_string());
    }
}

#[async_trait]
impl VcsBackend for FakeBackend {
    async fn is_repository(&self) -> bool {
        self.repository
    }

    async fn status(&self) -> Result<Vec<RepoStatusEntry>, BackendError> {
        Ok(self.state.lock().unwrap().status.clone())
    }

    async fn stage_paths(&self, updates: &[IndexUpdate]) -> Result<Vec<StageFailure>, BackendError> {
        let mut state = self.state.lock().unwrap();
        let mut failures = Vec::new();
        for update in updates {
            let path = update.path();
            if state.unstageable.contains(path) {
                failures.push(StageFailure {
                    path: path.to_string(),
                    error: BackendError::Command {
                        operation: "add".to_string(),
                        stderr: format!("unable to index file '{path}'"),
                    },
                });
            } else if !state.staged.iter().any(|p| p == path) {
                state.staged.push(path.to_string());
            }
        }
        Ok(failures)
    }

    async fn stage_all(&self) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        state.staged = state.status.iter().map(|e| e.path.clone()).collect();
        Ok(())
    }

    async fn unstage(&self, paths: &[String]) -> Result<(), BackendError> {
        self.state.lock().unwrap().staged.retain(|p| !paths.contains(p));
        Ok(())
    }

    async fn staged_paths(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.state.lock().unwrap().staged.clone())
    }

    async fn commit(&self, message: &str) -> Result<String, BackendError> {
        let mut state = self.state.lock().unwrap();
        if let Some(stderr) = state.commit_error.clone() {
            return Err(BackendError::Command {
                operation: "commit".to_string(),
                stderr,
            });
        }
        let staged = std::mem::take(&mut state.staged);
        state.status.retain(|e| !staged.contains(&e.path));
        state.commits.push(message.to_string());
        state.committed_paths.push(staged);
        Ok(format!("{:040x}", state.commits.len()))
    }

    async fn has_remote(&self, _remote: &str) -> bool {
        self.state.lock().unwrap().remote
    }

    async fn push(&self, _remote: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        if let Some(stderr) = state.push_error.clone() {
            return Err(BackendError::Command {
                operation: "push".to_string(),
                stderr,
            });
        }
        state.pushes += 1;
        Ok(())
    }
}
