//! autogit - turns bursts of working-tree changes into commits.
//!
//! # Overview
//!
//! File changes are debounced by the [`engine`] into batches. Each batch
//! runs one commit cycle through [`git::RepositoryController`]: stage the
//! live status minus excluded paths, describe it with a text generator
//! (or a count summary), commit, and push.

pub mod config;
pub mod engine;
pub mod error;
pub mod exclude;
pub mod git;
pub mod llm;
pub mod message;
pub mod watch;

// Re-export commonly used types
pub use config::{Config, LoadedConfig};
pub use engine::{ChangeAggregator, ChangeEventKind, Engine, EngineHandle, EngineState};
pub use error::{BackendError, ConfigError, CycleError, GeneratorError, PatternError, WatchError};
pub use exclude::ExclusionMatcher;
pub use git::{ChangeKind, CommitOutcome, CycleOptions, GitBackend, RepositoryController, VcsBackend};
pub use message::CommitMessageGenerator;
