//! Debounced auto-commit engine.
//!
//! [`ChangeAggregator`] holds the state machine; [`Engine`] runs it on
//! tokio and dispatches commit cycles to a
//! [`RepositoryController`](crate::git::RepositoryController).

pub mod aggregator;
pub mod runtime;

pub use aggregator::{
    Batch, ChangeAggregator, ChangeEvent, ChangeEventKind, DEFAULT_DELAY, EngineState, TimerHost,
    TimerId,
};
pub use runtime::{Engine, EngineHandle};
