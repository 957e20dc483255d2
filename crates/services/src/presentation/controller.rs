use std::sync::Arc;
use std::time::Duration;

use compagnon_core::model::{ModuleId, PresentationMode, SyncEvent, TemplateKind};
use compagnon_core::presentation::{
    ClientNavigationView, EventOutcome, GateState, NavigationError, NextStep, Role,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::backend::NavigationBackend;
use crate::bus::SessionSubscription;
use crate::error::ControllerError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

const COMMAND_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    pub poll_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Read-only copy of the view published after every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub role: Role,
    pub module_id: ModuleId,
    pub current_index: u32,
    pub known_allowed_index: u32,
    pub template: TemplateKind,
    pub gate: GateState,
    pub completed: bool,
    pub is_last: bool,
    pub mode: Option<PresentationMode>,
    pub session_ended: bool,
    /// Last failed backend call, cleared by the next success.
    pub last_error: Option<String>,
}

impl ViewSnapshot {
    fn capture(view: &ClientNavigationView, status: &Status) -> Self {
        Self {
            role: view.role(),
            module_id: view.module_id(),
            current_index: view.current_index(),
            known_allowed_index: view.known_allowed_index(),
            template: view.current_template(),
            gate: view.gate_state(),
            completed: view.submodule_completed(),
            is_last: view.is_last(),
            mode: status.mode,
            session_ended: status.session_ended,
            last_error: status.last_error.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Status {
    mode: Option<PresentationMode>,
    session_ended: bool,
    last_error: Option<String>,
}

enum Command {
    Next(oneshot::Sender<Result<NextStep, NavigationError>>),
    Previous(oneshot::Sender<Result<u32, NavigationError>>),
    MarkCompleted(oneshot::Sender<()>),
}

/// Handle to a running view actor.
///
/// Dropping the handle stops the actor and its poll.
pub struct PresentationController {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<ViewSnapshot>,
    task: JoinHandle<()>,
}

impl PresentationController {
    /// Spawn the actor. It polls the backend once right away, then on every
    /// `config.poll_interval` tick, and applies `events` as they arrive.
    #[must_use]
    pub fn spawn(
        view: ClientNavigationView,
        backend: Arc<dyn NavigationBackend>,
        events: mpsc::Receiver<SyncEvent>,
        config: ControllerConfig,
    ) -> Self {
        let status = Status::default();
        let (snapshot_tx, snapshot) = watch::channel(ViewSnapshot::capture(&view, &status));
        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);

        let actor = Actor {
            view,
            status,
            backend,
            events: Some(events),
            commands: command_rx,
            snapshot: snapshot_tx,
            poll_interval: config.poll_interval,
        };
        let task = tokio::spawn(actor.run());

        Self {
            commands,
            snapshot,
            task,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ViewSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch channel that changes whenever the view does.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot> {
        self.snapshot.clone()
    }

    /// User pressed "Next".
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Navigation` when gated or on the last slide
    /// and `ControllerError::Stopped` once the actor is gone.
    pub async fn next(&self) -> Result<NextStep, ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Next(tx)).await?;
        Ok(rx.await.map_err(|_| ControllerError::Stopped)??)
    }

    /// User pressed "Previous".
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Navigation` on the first slide and
    /// `ControllerError::Stopped` once the actor is gone.
    pub async fn previous(&self) -> Result<u32, ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Previous(tx)).await?;
        Ok(rx.await.map_err(|_| ControllerError::Stopped)??)
    }

    /// # Errors
    ///
    /// Returns `ControllerError::Stopped` once the actor is gone.
    pub async fn mark_completed(&self) -> Result<(), ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::MarkCompleted(tx)).await?;
        rx.await.map_err(|_| ControllerError::Stopped)
    }

    /// Stop the actor and wait for it to exit.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        if let Err(err) = task.await {
            warn!(error = %err, "presentation controller task failed");
        }
    }

    async fn send(&self, command: Command) -> Result<(), ControllerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ControllerError::Stopped)
    }
}

/// Bridge an in-process bus subscription into a controller event stream.
#[must_use]
pub fn events_from_bus(mut subscription: SessionSubscription) -> mpsc::Receiver<SyncEvent> {
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });
    rx
}

struct Actor {
    view: ClientNavigationView,
    status: Status,
    backend: Arc<dyn NavigationBackend>,
    events: Option<mpsc::Receiver<SyncEvent>>,
    commands: mpsc::Receiver<Command>,
    snapshot: watch::Sender<ViewSnapshot>,
    poll_interval: Duration,
}

impl Actor {
    async fn run(mut self) {
        debug!(
            session = %self.view.session_code(),
            module_id = %self.view.module_id(),
            "presentation view mounted"
        );
        self.poll().await;

        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.status.session_ended {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                event = recv_event(&mut self.events) => match event {
                    Some(event) => self.handle_event(&event),
                    None => {
                        debug!(session = %self.view.session_code(), "event stream closed; polling only");
                        self.events = None;
                    }
                },
                _ = ticker.tick() => self.poll().await,
            }
        }
        debug!(session = %self.view.session_code(), "presentation view stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Next(reply) => {
                let result = self.view.next();
                if let Ok(step) = result {
                    self.publish();
                    if step.advance_gate {
                        self.advance(step.new_index).await;
                    }
                }
                let _ = reply.send(result);
            }
            Command::Previous(reply) => {
                let result = self.view.previous();
                if result.is_ok() {
                    self.publish();
                }
                let _ = reply.send(result);
            }
            Command::MarkCompleted(reply) => {
                self.view.mark_completed();
                self.publish();
                let _ = reply.send(());
            }
        }
    }

    fn handle_event(&mut self, event: &SyncEvent) {
        if let SyncEvent::ModeChanged { mode } = event {
            self.status.mode = Some(*mode);
        }
        match self.view.apply_event(event) {
            EventOutcome::Ignored | EventOutcome::Unchanged => {}
            EventOutcome::Moved { from, to } => {
                debug!(event = event.name(), from, to, "view moved");
            }
            EventOutcome::AllowedRaised { from, to } => {
                debug!(event = event.name(), from, to, "allowed index raised");
            }
            EventOutcome::SessionEnded => {
                info!(session = %self.view.session_code(), "session ended by facilitator");
                self.status.session_ended = true;
            }
        }
        self.publish();
    }

    /// The facilitator's own view has already moved; a failure here is
    /// reported but not undone.
    async fn advance(&mut self, new_index: u32) {
        let code = self.view.session_code().clone();
        let module_id = self.view.module_id();
        match self.backend.advance(&code, module_id, new_index).await {
            Ok(outcome) => {
                self.view.apply_observed_allowed_index(outcome.allowed_index);
                self.status.last_error = None;
            }
            Err(err) => {
                warn!(session = %code, module_id = %module_id, new_index, error = %err, "advance failed");
                self.status.last_error = Some(err.to_string());
            }
        }
        self.publish();
    }

    async fn poll(&mut self) {
        let code = self.view.session_code().clone();
        let module_id = self.view.module_id();
        match self.backend.fetch_allowed_index(&code, module_id).await {
            Ok(observed) => {
                if let Some(from) = self.view.apply_observed_allowed_index(observed) {
                    debug!(session = %code, from, to = observed, "poll raised allowed index");
                }
                self.status.last_error = None;
            }
            Err(err) => {
                warn!(session = %code, module_id = %module_id, error = %err, "allowed index poll failed");
                self.status.last_error = Some(err.to_string());
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let next = ViewSnapshot::capture(&self.view, &self.status);
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

async fn recv_event(events: &mut Option<mpsc::Receiver<SyncEvent>>) -> Option<SyncEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
