//! Error types for autogit modules using thiserror.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Failures reported by a version-control backend.
///
/// Every variant carries the backend's textual error; the repository
/// controller decides whether a failure is absorbed or surfaced.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Failed to run git {operation}: {source}")]
    Spawn {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {operation} failed: {stderr}")]
    Command { operation: String, stderr: String },

    #[error("Repository has no working directory")]
    BareRepository,

    #[error("git task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Terminal classification of a commit cycle.
///
/// `NothingToCommit` is a normal no-op outcome rather than a failure;
/// see [`CycleError::is_failure`].
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail")]
pub enum CycleError {
    #[error("Not a git repository")]
    NotARepository,

    #[error("Nothing to commit")]
    NothingToCommit,

    #[error("Failed to read repository status: {0}")]
    StatusFailed(String),

    #[error("Commit failed: {0}")]
    CommitFailed(String),

    #[error("Push failed: authentication required: {0}")]
    AuthenticationFailed(String),

    #[error("Push rejected by remote: {0}")]
    PushRejected(String),

    #[error("Push failed: {0}")]
    PushFailed(String),
}

impl CycleError {
    /// Whether this outcome should be rendered as an error.
    pub fn is_failure(&self) -> bool {
        !matches!(self, CycleError::NothingToCommit)
    }

    /// User-actionable hint for failures the user can resolve.
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            CycleError::NotARepository => {
                Some("Run `git init` or point autogit at an existing repository.")
            }
            CycleError::AuthenticationFailed(_) => Some(
                "Check your git credentials: configure a credential helper, \
                 load your SSH key into the agent, or refresh your access token.",
            ),
            CycleError::PushRejected(_) => Some(
                "The remote has commits you don't have. Pull (and rebase) to \
                 integrate them; your local commit is kept and will be pushed \
                 on the next cycle.",
            ),
            CycleError::CommitFailed(_) => {
                Some("Make sure user.name and user.email are set in your git config.")
            }
            _ => None,
        }
    }
}

/// A malformed exclusion pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Unterminated character class in pattern '{0}'")]
    UnterminatedClass(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    Invalid { pattern: String, reason: String },
}

/// Errors from the external text-generation backend.
///
/// These never escape the message generator: any of them triggers the
/// deterministic fallback summary.
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("No text-generation model available: {0}")]
    Unavailable(String),

    #[error("Failed to spawn {tool}: {source}")]
    SpawnFailed {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with code {code}: {stderr}")]
    NonZeroExit {
        tool: &'static str,
        code: i32,
        stderr: String,
    },

    #[error("Generator reported an error: {0}")]
    ExecutionFailed(String),

    #[error("Generator timed out after {0} seconds")]
    Timeout(u64),

    #[error("Generator returned no candidates")]
    Empty,
}

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from change-event sources.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to create watcher: {0}")]
    WatcherCreation(#[from] notify::Error),

    #[error("Failed to watch path {path}: {source}")]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}
