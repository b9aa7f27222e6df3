//! Debounce state machine turning change events into commit batches.
//!
//! The aggregator never sleeps or spawns. Timers are requested through a
//! [`TimerHost`] and reported back by id, so the same logic runs against
//! tokio timers in production and a fake clock in tests.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::exclude::ExclusionMatcher;

/// Identifies one armed debounce timer.
pub type TimerId = u64;

/// Default quiet window before a batch is committed.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(3000);

/// Host capability for arming and cancelling timers by id.
///
/// When an armed timer elapses the host must call
/// [`ChangeAggregator::on_timer_fired`] with the same id.
pub trait TimerHost {
    fn arm(&mut self, id: TimerId, delay: Duration);
    fn cancel(&mut self, id: TimerId);
}

/// Lifecycle of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Disabled,
    Idle,
    Pending,
    Running,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Disabled => "disabled",
            EngineState::Idle => "idle",
            EngineState::Pending => "pending",
            EngineState::Running => "running",
        };
        f.write_str(s)
    }
}

/// Kind of filesystem change reported by an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeEventKind {
    Created,
    Modified,
    Deleted,
}

/// A change to one path, relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: String,
    pub kind: ChangeEventKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<String>, kind: ChangeEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Paths handed to one commit cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub paths: Vec<String>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Coalesces bursts of change events into single commit batches.
///
/// Invariants:
/// - at most one cycle is in flight at any time
/// - the pending batch never holds an excluded path
/// - at most one debounce timer is armed, and it measures quiet time
///   since the last accepted event
#[derive(Debug)]
pub struct ChangeAggregator {
    state: EngineState,
    pending: BTreeSet<String>,
    armed: Option<TimerId>,
    next_timer: TimerId,
    in_flight: bool,
    rerun_requested: bool,
    delay: Duration,
    exclude: ExclusionMatcher,
}

impl ChangeAggregator {
    pub fn new(delay: Duration, exclude: ExclusionMatcher) -> Self {
        Self {
            state: EngineState::Disabled,
            pending: BTreeSet::new(),
            armed: None,
            next_timer: 0,
            in_flight: false,
            rerun_requested: false,
            delay,
            exclude,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Paths accumulated since the last dispatched batch.
    pub fn pending_paths(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// `Disabled → Idle`. Re-enabling while a cycle from before the last
    /// `disable` is still running resumes in `Running`.
    pub fn enable(&mut self) -> bool {
        if self.state != EngineState::Disabled {
            return false;
        }
        self.pending.clear();
        self.state = if self.in_flight {
            EngineState::Running
        } else {
            EngineState::Idle
        };
        true
    }

    /// Any state → `Disabled`. Cancels the pending timer and drops the
    /// pending batch; an in-flight cycle is left to finish.
    pub fn disable(&mut self, timers: &mut impl TimerHost) {
        self.cancel_timer(timers);
        self.pending.clear();
        self.rerun_requested = false;
        self.state = EngineState::Disabled;
    }

    /// Record a change. Returns whether the path entered the pending batch.
    pub fn on_change_event(&mut self, event: &ChangeEvent, timers: &mut impl TimerHost) -> bool {
        if self.state == EngineState::Disabled {
            return false;
        }
        if self.exclude.is_excluded(&event.path) {
            debug!("Ignoring excluded path {}", event.path);
            return false;
        }

        self.pending.insert(event.path.clone());

        // Changes made while a cycle runs wait for it to finish.
        if self.state == EngineState::Running {
            return true;
        }

        self.cancel_timer(timers);
        let id = self.next_timer_id();
        timers.arm(id, self.delay);
        self.armed = Some(id);
        self.state = EngineState::Pending;
        true
    }

    /// The timer with `id` elapsed. Returns the batch to commit, or `None`
    /// for a stale or cancelled timer.
    pub fn on_timer_fired(&mut self, id: TimerId) -> Option<Batch> {
        if self.armed != Some(id) {
            debug!("Ignoring stale timer {}", id);
            return None;
        }
        self.armed = None;

        if self.state != EngineState::Pending {
            return None;
        }
        Some(self.start_cycle())
    }

    /// Skip the quiet window and dispatch now.
    ///
    /// While a cycle is running the request is remembered and a follow-up
    /// cycle starts as soon as the current one finishes.
    pub fn commit_now(&mut self, timers: &mut impl TimerHost) -> Option<Batch> {
        match self.state {
            EngineState::Disabled => None,
            EngineState::Running => {
                self.rerun_requested = true;
                None
            }
            EngineState::Idle | EngineState::Pending => {
                self.cancel_timer(timers);
                Some(self.start_cycle())
            }
        }
    }

    /// The in-flight cycle finished, whatever its outcome.
    ///
    /// Returns a batch when a follow-up cycle should start immediately.
    pub fn finish_cycle(&mut self, timers: &mut impl TimerHost) -> Option<Batch> {
        self.in_flight = false;

        if self.state == EngineState::Disabled {
            return None;
        }

        if self.rerun_requested {
            self.rerun_requested = false;
            return Some(self.start_cycle());
        }

        if self.pending.is_empty() {
            self.state = EngineState::Idle;
        } else {
            let id = self.next_timer_id();
            timers.arm(id, self.delay);
            self.armed = Some(id);
            self.state = EngineState::Pending;
        }
        None
    }

    fn start_cycle(&mut self) -> Batch {
        self.state = EngineState::Running;
        self.in_flight = true;
        let paths = std::mem::take(&mut self.pending).into_iter().collect();
        Batch { paths }
    }

    fn cancel_timer(&mut self, timers: &mut impl TimerHost) {
        if let Some(id) = self.armed.take() {
            timers.cancel(id);
        }
    }

    fn next_timer_id(&mut self) -> TimerId {
        self.next_timer += 1;
        self.next_timer
    }
}
