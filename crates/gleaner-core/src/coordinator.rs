//! The run coordinator.
//!
//! A long-lived task that owns the [`RunStateMachine`]. Clients talk to it
//! through a [`CoordinatorHandle`]; each run is a separate task whose events
//! come back tagged with its [`RunId`]. Every state change is broadcast to all
//! subscribers as a full [`RunState`] snapshot.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::AppError;
use crate::models::RunState;
use crate::state::{Applied, RunId, RunStateMachine};
use crate::traits::{Fetcher, ItemHighlighter, PageSource};
use crate::worker::{EventSink, ScrapeEvent, ScrapeReporter, ScrapeWorker, WorkerEvent};

const COMMAND_BUFFER: usize = 32;
const UPDATE_BUFFER: usize = 64;

/// Requests served by the coordinator. Every command is answered with the
/// state snapshot after it was handled.
#[derive(Debug)]
pub enum Command {
    Start {
        target: Url,
        reply: oneshot::Sender<RunState>,
    },
    Cancel {
        reply: oneshot::Sender<RunState>,
    },
    GetState {
        reply: oneshot::Sender<RunState>,
    },
}

/// Cheap, cloneable client of a running coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
    // A receiver, not a sender, so the channel closes with the coordinator.
    updates: Arc<broadcast::Receiver<RunState>>,
}

impl CoordinatorHandle {
    /// Start a run against `target`, superseding any active run.
    pub async fn start(&self, target: Url) -> Result<RunState, AppError> {
        self.request(|reply| Command::Start { target, reply }).await
    }

    /// Cancel the active run. A no-op when nothing is running.
    pub async fn cancel(&self) -> Result<RunState, AppError> {
        self.request(|reply| Command::Cancel { reply }).await
    }

    pub async fn get_state(&self) -> Result<RunState, AppError> {
        self.request(|reply| Command::GetState { reply }).await
    }

    /// Receive every state snapshot broadcast from now on.
    ///
    /// The stream ends once the coordinator has stopped.
    pub fn subscribe(&self) -> broadcast::Receiver<RunState> {
        self.updates.resubscribe()
    }

    async fn request(
        &self,
        command: impl FnOnce(oneshot::Sender<RunState>) -> Command,
    ) -> Result<RunState, AppError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| AppError::CoordinatorClosed)?;
        response.await.map_err(|_| AppError::CoordinatorClosed)
    }
}

/// Forwards a worker's events to the coordinator, tagged with its run.
struct RunEventSink {
    run_id: RunId,
    tx: mpsc::UnboundedSender<(RunId, WorkerEvent)>,
}

impl EventSink for RunEventSink {
    fn emit(&self, event: WorkerEvent) {
        // The coordinator is gone only during shutdown.
        let _ = self.tx.send((self.run_id, event));
    }
}

struct ActiveRun {
    run_id: RunId,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owner of the run state; see the module docs.
pub struct RunCoordinator<P, F, H, R>
where
    P: PageSource,
    F: Fetcher,
    H: ItemHighlighter,
    R: ScrapeReporter,
{
    machine: RunStateMachine,
    page_source: P,
    worker: Arc<ScrapeWorker<F, H>>,
    reporter: Arc<R>,
    shutdown: CancellationToken,
    updates: broadcast::Sender<RunState>,
    events_tx: mpsc::UnboundedSender<(RunId, WorkerEvent)>,
    active: Option<ActiveRun>,
    retired: Vec<JoinHandle<()>>,
}

impl<P, F, H, R> RunCoordinator<P, F, H, R>
where
    P: PageSource + 'static,
    F: Fetcher + 'static,
    H: ItemHighlighter + 'static,
    R: ScrapeReporter + 'static,
{
    /// Spawn the coordinator task.
    ///
    /// It stops when `shutdown` is cancelled or every handle has been dropped,
    /// taking any run still in flight down with it.
    pub fn spawn(
        page_source: P,
        worker: ScrapeWorker<F, H>,
        reporter: R,
        shutdown: CancellationToken,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (updates, updates_rx) = broadcast::channel(UPDATE_BUFFER);

        let handle = CoordinatorHandle {
            commands: commands_tx,
            updates: Arc::new(updates_rx),
        };
        let coordinator = Self {
            machine: RunStateMachine::new(),
            page_source,
            worker: Arc::new(worker),
            reporter: Arc::new(reporter),
            shutdown,
            updates,
            events_tx,
            active: None,
            retired: Vec::new(),
        };

        let task = tokio::spawn(coordinator.run(commands_rx, events_rx));
        (handle, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<(RunId, WorkerEvent)>,
    ) {
        tracing::debug!("Run coordinator started");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some((run_id, event)) = events.recv() => self.handle_event(run_id, event),
            }
        }

        self.stop_runs().await;
        tracing::debug!("Run coordinator stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { target, reply } => {
                self.start(target);
                let _ = reply.send(self.machine.snapshot());
            }
            Command::Cancel { reply } => {
                self.cancel();
                let _ = reply.send(self.machine.snapshot());
            }
            Command::GetState { reply } => {
                let _ = reply.send(self.machine.snapshot());
            }
        }
    }

    fn start(&mut self, target: Url) {
        let outcome = self.machine.start(&target);
        if let Some(previous) = outcome.superseded {
            tracing::info!(%previous, "Superseding active run");
        }
        self.retire_active();

        tracing::info!(run_id = %outcome.run_id, %target, "Run started");
        self.active = Some(self.spawn_run(outcome.run_id, target));
        self.broadcast();
    }

    fn cancel(&mut self) {
        match self.machine.cancel() {
            Some(run_id) => {
                tracing::info!(%run_id, "Run cancelled");
                self.retire_active();
                self.broadcast();
            }
            None => tracing::debug!("Cancel ignored, no run in progress"),
        }
    }

    fn handle_event(&mut self, run_id: RunId, event: WorkerEvent) {
        let kind = match &event {
            WorkerEvent::Progress(_) => "progress",
            WorkerEvent::Complete(_) => "complete",
            WorkerEvent::Error(_) => "error",
        };

        match self.machine.apply(run_id, event) {
            Applied::Changed => {
                let state = self.machine.state();
                if state.status.is_settled() {
                    tracing::info!(
                        %run_id,
                        status = %state.status,
                        records = state.records.len(),
                        "Run settled"
                    );
                }
                self.broadcast();
            }
            Applied::Unchanged => {}
            Applied::Stale => {
                tracing::debug!(%run_id, event = kind, "Discarding stale worker event");
            }
        }
    }

    /// Cancel the current run's task and keep its handle until it exits.
    fn retire_active(&mut self) {
        self.retired.retain(|handle| !handle.is_finished());
        if let Some(run) = self.active.take() {
            tracing::debug!(run_id = %run.run_id, "Signalling run to stop");
            run.token.cancel();
            self.retired.push(run.handle);
        }
    }

    /// On exit, runs are not waited on cooperatively: an in-flight fetch is
    /// dropped, which also clears its highlight.
    async fn stop_runs(&mut self) {
        self.retire_active();
        for handle in self.retired.drain(..) {
            handle.abort();
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::warn!(error = %e, "Run task ended abnormally"),
            }
        }
    }

    fn broadcast(&self) {
        // No subscribers is fine; state is still served by `get_state`.
        let _ = self.updates.send(self.machine.snapshot());
    }

    fn spawn_run(&self, run_id: RunId, target: Url) -> ActiveRun {
        let token = self.shutdown.child_token();
        let sink = RunEventSink {
            run_id,
            tx: self.events_tx.clone(),
        };
        let source = self.page_source.clone();
        let worker = Arc::clone(&self.worker);
        let reporter = Arc::clone(&self.reporter);
        let cancel = token.clone();

        let handle = tokio::spawn(async move {
            let loaded = tokio::select! {
                _ = cancel.cancelled() => return,
                loaded = source.load(&target) => loaded,
            };

            match loaded {
                Ok(page) => worker.run(&page, &cancel, &sink, reporter.as_ref()).await,
                Err(e) if cancel.is_cancelled() => {
                    reporter.report(ScrapeEvent::FailureSuppressed {
                        error: &e.to_string(),
                    });
                }
                Err(e) => {
                    let message = e.to_string();
                    reporter.report(ScrapeEvent::Failed { error: &message });
                    sink.emit(WorkerEvent::Error(message));
                }
            }
        });

        ActiveRun {
            run_id,
            token,
            handle,
        }
    }
}
