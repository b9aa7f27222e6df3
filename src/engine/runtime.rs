//! Tokio actor that owns a [`ChangeAggregator`] and runs commit cycles.
//!
//! All state changes happen on the actor task, one command at a time.
//! Timers and cycles run in their own tasks and report back through the
//! same command channel, so a timer can never race a cycle completion.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::aggregator::{
    Batch, ChangeAggregator, ChangeEvent, ChangeEventKind, EngineState, TimerHost, TimerId,
};
use crate::exclude::ExclusionMatcher;
use crate::git::{CommitOutcome, RepositoryController};

/// Capacity of the outcome broadcast; slow subscribers see `Lagged`.
const OUTCOME_CAPACITY: usize = 32;

enum Command {
    Enable,
    Disable,
    Change(ChangeEvent),
    CommitNow,
    TimerFired(TimerId),
    CycleFinished(Box<CommitOutcome>),
    State(oneshot::Sender<EngineState>),
}

/// Cloneable handle for driving a running [`Engine`].
///
/// The engine stops once every handle is dropped and no timer or cycle
/// is outstanding.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
    outcomes: broadcast::Sender<CommitOutcome>,
}

impl EngineHandle {
    pub fn enable(&self) {
        self.send(Command::Enable);
    }

    pub fn disable(&self) {
        self.send(Command::Disable);
    }

    pub fn on_change_event(&self, path: impl Into<String>, kind: ChangeEventKind) {
        self.send(Command::Change(ChangeEvent::new(path, kind)));
    }

    pub fn commit_now(&self) {
        self.send(Command::CommitNow);
    }

    /// Current state, or `None` if the engine has stopped.
    pub async fn state(&self) -> Option<EngineState> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::State(tx));
        rx.await.ok()
    }

    /// Receive the outcome of every cycle that finishes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CommitOutcome> {
        self.outcomes.subscribe()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Engine has stopped, dropping command");
        }
    }
}

/// Spawns debounce timers as sleeping tasks that report back by id.
struct TokioTimers {
    commands: mpsc::WeakUnboundedSender<Command>,
    handles: HashMap<TimerId, JoinHandle<()>>,
}

impl TimerHost for TokioTimers {
    fn arm(&mut self, id: TimerId, delay: Duration) {
        let Some(commands) = self.commands.upgrade() else {
            return;
        };
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = commands.send(Command::TimerFired(id));
        });
        self.handles.insert(id, handle);
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(handle) = self.handles.remove(&id) {
            handle.abort();
        }
    }
}

/// Serializes change events, timers, and commit cycles for one repository.
pub struct Engine {
    aggregator: ChangeAggregator,
    controller: Arc<RepositoryController>,
    timers: TokioTimers,
    commands: mpsc::UnboundedReceiver<Command>,
    outcomes: broadcast::Sender<CommitOutcome>,
}

impl Engine {
    /// Start the engine on the current tokio runtime.
    ///
    /// The engine starts `Disabled`; call [`EngineHandle::enable`] to begin
    /// accepting events.
    pub fn spawn(
        controller: Arc<RepositoryController>,
        delay: Duration,
        exclude: ExclusionMatcher,
    ) -> (EngineHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (outcomes, _) = broadcast::channel(OUTCOME_CAPACITY);

        let engine = Engine {
            aggregator: ChangeAggregator::new(delay, exclude),
            controller,
            timers: TokioTimers {
                commands: tx.downgrade(),
                handles: HashMap::new(),
            },
            commands: rx,
            outcomes: outcomes.clone(),
        };

        let task = tokio::spawn(engine.run());
        let handle = EngineHandle {
            commands: tx,
            outcomes,
        };
        (handle, task)
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.handle(command);
        }
        debug!("Engine stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Enable => {
                if self.aggregator.enable() {
                    info!("Auto-commit enabled");
                }
            }
            Command::Disable => {
                self.aggregator.disable(&mut self.timers);
                info!("Auto-commit disabled");
            }
            Command::Change(event) => {
                if self.aggregator.on_change_event(&event, &mut self.timers) {
                    debug!("{:?} {}", event.kind, event.path);
                }
            }
            Command::CommitNow => {
                if let Some(batch) = self.aggregator.commit_now(&mut self.timers) {
                    self.start_cycle(batch);
                } else if self.aggregator.state() == EngineState::Running {
                    debug!("Cycle in flight, commit queued");
                }
            }
            Command::TimerFired(id) => {
                self.timers.handles.remove(&id);
                if let Some(batch) = self.aggregator.on_timer_fired(id) {
                    self.start_cycle(batch);
                }
            }
            Command::CycleFinished(outcome) => {
                // No subscribers is fine.
                let _ = self.outcomes.send(*outcome);
                if let Some(batch) = self.aggregator.finish_cycle(&mut self.timers) {
                    self.start_cycle(batch);
                }
            }
            Command::State(reply) => {
                let _ = reply.send(self.aggregator.state());
            }
        }
    }

    fn start_cycle(&mut self, batch: Batch) {
        let Some(commands) = self.timers.commands.upgrade() else {
            warn!("Engine is shutting down, dropping batch of {} path(s)", batch.len());
            self.aggregator.finish_cycle(&mut self.timers);
            return;
        };

        info!("Starting commit cycle ({} changed path(s))", batch.len());
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move {
            let outcome = controller.run_cycle().await;
            if outcome.is_failure() {
                warn!("{}", outcome.summary());
            } else {
                info!("{}", outcome.summary());
            }
            let _ = commands.send(Command::CycleFinished(Box::new(outcome)));
        });
    }
}
