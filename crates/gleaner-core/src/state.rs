//! The run state machine.
//!
//! ```text
//! IDLE ----start----> RUNNING --complete--> COMPLETE
//!   ^                  |  |  \--error-----> ERROR
//!   +------cancel------+  +--progress--+
//!                            (stays RUNNING)
//! COMPLETE / ERROR --start--> RUNNING
//! RUNNING --start--> RUNNING (previous run is superseded)
//! ```
//!
//! Worker events carry the id of the run that produced them and are applied
//! only while that run is the current, running one.

use url::Url;
use uuid::Uuid;

use crate::models::{RunState, RunStatus};
use crate::worker::WorkerEvent;

/// Identifies one run from `start` to its terminal state.
pub type RunId = Uuid;

const UNKNOWN_ERROR: &str = "Unknown error";

/// Result of [`RunStateMachine::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOutcome {
    pub run_id: RunId,
    /// The run that was still active and must now be cancelled.
    pub superseded: Option<RunId>,
}

/// Result of [`RunStateMachine::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The state changed and should be broadcast.
    Changed,
    /// Accepted, but the state is the same as before (a repeated event).
    Unchanged,
    /// From a run that is no longer current, or arrived after the run settled.
    Stale,
}

/// Owner of the authoritative [`RunState`].
#[derive(Debug, Default)]
pub struct RunStateMachine {
    state: RunState,
    current: Option<RunId>,
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn snapshot(&self) -> RunState {
        self.state.clone()
    }

    /// The run whose events are currently accepted.
    pub fn current_run(&self) -> Option<RunId> {
        self.current.filter(|_| self.state.status == RunStatus::Running)
    }

    /// Begin a new run against `target`, superseding any active one.
    pub fn start(&mut self, target: &Url) -> StartOutcome {
        let superseded = if self.state.status.is_settled() {
            None
        } else {
            self.current
        };

        let run_id = Uuid::new_v4();
        self.current = Some(run_id);
        self.state = RunState {
            status: RunStatus::Running,
            progress: 0,
            records: Vec::new(),
            error_message: String::new(),
            target: Some(target.to_string()),
        };

        StartOutcome { run_id, superseded }
    }

    /// Abort the active run and return to idle.
    ///
    /// Returns the run to signal, or `None` if nothing was running.
    pub fn cancel(&mut self) -> Option<RunId> {
        if self.state.status != RunStatus::Running {
            return None;
        }
        self.state = RunState::idle();
        self.current.take()
    }

    /// Apply an event reported by the worker of `run_id`.
    pub fn apply(&mut self, run_id: RunId, event: WorkerEvent) -> Applied {
        if self.current_run() != Some(run_id) {
            return Applied::Stale;
        }

        match event {
            WorkerEvent::Progress(percent) => {
                let percent = percent.min(100);
                if percent <= self.state.progress {
                    return Applied::Unchanged;
                }
                self.state.progress = percent;
            }
            WorkerEvent::Complete(records) => {
                self.state.status = RunStatus::Complete;
                self.state.records = records;
            }
            WorkerEvent::Error(message) => {
                self.state.status = RunStatus::Error;
                self.state.error_message = if message.is_empty() {
                    UNKNOWN_ERROR.to_string()
                } else {
                    message
                };
            }
        }
        Applied::Changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    fn target() -> Url {
        Url::parse("https://dealer.example.com/machinery/excavators").unwrap()
    }

    fn record(i: usize) -> Record {
        Record::unavailable(format!("https://dealer.example.com/item/{i}"))
    }

    #[test]
    fn starts_idle() {
        let machine = RunStateMachine::new();
        assert_eq!(machine.state(), &RunState::idle());
        assert_eq!(machine.current_run(), None);
    }

    #[test]
    fn start_resets_previous_results() {
        let mut machine = RunStateMachine::new();
        let first = machine.start(&target()).run_id;
        machine.apply(first, WorkerEvent::Progress(50));
        machine.apply(first, WorkerEvent::Error("boom".into()));
        assert_eq!(machine.state().status, RunStatus::Error);

        let outcome = machine.start(&target());
        assert_eq!(outcome.superseded, None);
        let state = machine.state();
        assert_eq!(state.status, RunStatus::Running);
        assert_eq!(state.progress, 0);
        assert!(state.records.is_empty());
        assert!(state.error_message.is_empty());
        assert_eq!(state.target.as_deref(), Some(target().as_str()));
    }

    #[test]
    fn progress_then_complete() {
        let mut machine = RunStateMachine::new();
        let run = machine.start(&target()).run_id;

        assert_eq!(machine.apply(run, WorkerEvent::Progress(50)), Applied::Changed);
        assert_eq!(machine.state().progress, 50);
        assert_eq!(
            machine.apply(run, WorkerEvent::Complete(vec![record(1), record(2)])),
            Applied::Changed
        );
        assert_eq!(machine.state().status, RunStatus::Complete);
        assert_eq!(machine.state().records.len(), 2);
        assert_eq!(machine.current_run(), None);
    }

    #[test]
    fn repeated_progress_is_unchanged() {
        let mut machine = RunStateMachine::new();
        let run = machine.start(&target()).run_id;
        machine.apply(run, WorkerEvent::Progress(40));

        assert_eq!(machine.apply(run, WorkerEvent::Progress(40)), Applied::Unchanged);
        assert_eq!(machine.apply(run, WorkerEvent::Progress(20)), Applied::Unchanged);
        assert_eq!(machine.state().progress, 40);
    }

    #[test]
    fn duplicate_complete_is_stale() {
        let mut machine = RunStateMachine::new();
        let run = machine.start(&target()).run_id;
        machine.apply(run, WorkerEvent::Complete(vec![record(1)]));

        assert_eq!(
            machine.apply(run, WorkerEvent::Complete(vec![])),
            Applied::Stale
        );
        assert_eq!(machine.apply(run, WorkerEvent::Error("late".into())), Applied::Stale);
        assert_eq!(machine.state().records.len(), 1);
        assert!(machine.state().error_message.is_empty());
    }

    #[test]
    fn cancel_returns_to_idle_and_ignores_late_events() {
        let mut machine = RunStateMachine::new();
        let run = machine.start(&target()).run_id;
        machine.apply(run, WorkerEvent::Progress(30));

        assert_eq!(machine.cancel(), Some(run));
        assert_eq!(machine.state(), &RunState::idle());

        assert_eq!(machine.apply(run, WorkerEvent::Progress(60)), Applied::Stale);
        assert_eq!(machine.apply(run, WorkerEvent::Complete(vec![record(1)])), Applied::Stale);
        assert_eq!(machine.apply(run, WorkerEvent::Error("x".into())), Applied::Stale);
        assert_eq!(machine.state(), &RunState::idle());
    }

    #[test]
    fn cancel_when_not_running_is_noop() {
        let mut machine = RunStateMachine::new();
        assert_eq!(machine.cancel(), None);

        let run = machine.start(&target()).run_id;
        machine.apply(run, WorkerEvent::Complete(vec![record(1)]));
        assert_eq!(machine.cancel(), None);
        assert_eq!(machine.state().status, RunStatus::Complete);
    }

    #[test]
    fn restart_while_running_supersedes_old_run() {
        let mut machine = RunStateMachine::new();
        let old = machine.start(&target()).run_id;
        machine.apply(old, WorkerEvent::Progress(80));

        let outcome = machine.start(&target());
        assert_eq!(outcome.superseded, Some(old));
        assert_ne!(outcome.run_id, old);
        assert_eq!(machine.state().progress, 0);

        assert_eq!(machine.apply(old, WorkerEvent::Progress(90)), Applied::Stale);
        assert_eq!(machine.apply(old, WorkerEvent::Complete(vec![record(9)])), Applied::Stale);
        assert_eq!(machine.state().status, RunStatus::Running);
        assert_eq!(machine.state().progress, 0);

        assert_eq!(
            machine.apply(outcome.run_id, WorkerEvent::Progress(10)),
            Applied::Changed
        );
    }

    #[test]
    fn empty_error_message_is_replaced() {
        let mut machine = RunStateMachine::new();
        let run = machine.start(&target()).run_id;
        machine.apply(run, WorkerEvent::Error(String::new()));
        assert_eq!(machine.state().error_message, UNKNOWN_ERROR);
    }

    #[test]
    fn error_and_complete_never_both_apply() {
        let mut machine = RunStateMachine::new();
        let run = machine.start(&target()).run_id;
        machine.apply(run, WorkerEvent::Error("fetch failed".into()));
        machine.apply(run, WorkerEvent::Complete(vec![record(1)]));

        let state = machine.state();
        assert_eq!(state.status, RunStatus::Error);
        assert!(state.records.is_empty());
    }
}
