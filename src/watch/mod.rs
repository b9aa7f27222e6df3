//! Change-event sources feeding the engine.
//!
//! Both sources report paths relative to the repository root and can run
//! side by side; the engine deduplicates paths within a batch.

pub mod fs;
pub mod poll;

pub use fs::FsWatcher;
pub use poll::StatusPoller;
