//! Live synchronisation of the card list.
//!
//! ## Architecture overview
//!
//! ```text
//!  ┌────────────┐ Channel ┌──────────────────────────────┐  SyncView  ┌────────┐
//!  │ connection │ ──────► │                              │ ─────────► │   UI   │
//!  └────────────┘         │         Orchestrator         │  (watch)   └────────┘
//!  ┌────────────┐  Tick   │  push · polling · heartbeat  │ ◄───────── refresh
//!  │   timers   │ ──────► │                              │  commands
//!  └────────────┘         └──────────────────────────────┘
//!                              │ spawn          ▲ result
//!                              ▼                │
//!                         ┌──────────────────────┐
//!                         │  fetches (JoinSet)   │
//!                         └──────────────────────┘
//! ```
//!
//! Everything runs on one current-thread Tokio runtime, on a thread of its
//! own so the terminal loop never blocks it.  Timers and the push
//! connection are tasks that only post events; fetches are tasks whose
//! results are collected from a `JoinSet`.  All state lives in the
//! [`Orchestrator`] and only changes on its loop, so there are no locks.
//!
//! Fetches from different sources may overlap.  Each result is compared with
//! whatever snapshot is current when it lands; the last one to land wins.

mod detect;
mod heartbeat;
mod poll;
mod push;
mod schedule;

pub use detect::has_changed;
pub use schedule::LedgerCounts;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::FetchError;
use crate::source::{CardSource, PushSource, Snapshot};
use heartbeat::{Heartbeat, HEALTH_INTERVAL};
use poll::{PollingFallback, POLL_INTERVAL};
use push::{PushAction, PushChannel, RECONNECT_BACKOFF};
use schedule::{ResourceLedger, Scheduler, SyncEvent, TaskId};

/// Why a fetch was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// Startup, or the user pressed refresh.
    Manual,
    Push,
    Poll,
    Health,
}

/// Which mechanism is currently delivering updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Push,
    Polling,
}

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub poll_interval: Duration,
    pub health_interval: Duration,
    pub reconnect_backoff: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            health_interval: HEALTH_INTERVAL,
            reconnect_backoff: RECONNECT_BACKOFF,
        }
    }
}

/// What the presentation layer sees.  Read-only; a fresh value is published
/// on every state change.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncView {
    pub cards: Arc<Snapshot>,
    pub loading: bool,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub mode: SyncMode,
}

impl SyncView {
    pub fn initial() -> Self {
        SyncState::new().view()
    }
}

struct SyncState {
    last_snapshot: Option<Arc<Snapshot>>,
    /// True until the first fetch completes, then never again.
    loading: bool,
    error: Option<String>,
    last_updated_at: Option<DateTime<Utc>>,
    mode: SyncMode,
}

impl SyncState {
    fn new() -> Self {
        Self {
            last_snapshot: None,
            loading: true,
            error: None,
            last_updated_at: None,
            mode: SyncMode::Push,
        }
    }

    fn view(&self) -> SyncView {
        SyncView {
            cards: self.last_snapshot.clone().unwrap_or_default(),
            loading: self.loading,
            error: self.error.clone(),
            last_updated: self.last_updated_at,
            mode: self.mode,
        }
    }
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send>;

pub struct Orchestrator {
    state: SyncState,
    cards: Arc<dyn CardSource>,
    push: PushChannel,
    polling: PollingFallback,
    heartbeat: Heartbeat,
    scheduler: Scheduler,
    events: mpsc::UnboundedReceiver<SyncEvent>,
    fetches: JoinSet<(FetchSource, Result<Snapshot, FetchError>)>,
    view: watch::Sender<SyncView>,
    clock: Clock,
    torn_down: bool,
}

impl Orchestrator {
    pub fn new(
        cards: Arc<dyn CardSource>,
        push: Arc<dyn PushSource>,
        settings: SyncSettings,
    ) -> (Self, watch::Receiver<SyncView>) {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (view, view_rx) = watch::channel(SyncView::initial());

        let orchestrator = Self {
            state: SyncState::new(),
            cards,
            push: PushChannel::new(push, settings.reconnect_backoff),
            polling: PollingFallback::new(settings.poll_interval),
            heartbeat: Heartbeat::new(settings.health_interval),
            scheduler: Scheduler::new(events_tx, ResourceLedger::default()),
            events,
            fetches: JoinSet::new(),
            view,
            clock: Box::new(Utc::now),
            torn_down: false,
        };
        (orchestrator, view_rx)
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn ledger(&self) -> LedgerCounts {
        self.scheduler.ledger().counts()
    }

    /// Initial fetch, then push channel, then heartbeat.  Must be called
    /// from inside the runtime that will drive [`Orchestrator::run`].
    pub fn init(&mut self) {
        info!(source = self.cards.name(), "starting sync");
        self.fetch(FetchSource::Manual);
        self.push.start(&self.scheduler);
        self.heartbeat.start(&self.scheduler);
        self.publish();
    }

    /// Drive the engine until `Shutdown` arrives or the handle is dropped,
    /// then tear down.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SyncCommand>) {
        self.init();
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(SyncCommand::Refresh) => self.fetch(FetchSource::Manual),
                    Some(SyncCommand::Shutdown) | None => break,
                },
                alive = self.step() => if !alive {
                    break;
                },
            }
        }
        self.teardown();
    }

    /// Wait for and handle one event.  Returns `false` once torn down.
    async fn step(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        tokio::select! {
            Some(joined) = self.fetches.join_next(), if !self.fetches.is_empty() => match joined {
                Ok((source, result)) => self.apply_fetch(source, result),
                Err(e) if e.is_cancelled() => {}
                Err(e) => error!(error = %e, "fetch task panicked"),
            },
            Some(event) = self.events.recv() => self.handle_event(event),
            else => return false,
        }
        true
    }

    fn fetch(&mut self, source: FetchSource) {
        debug!(?source, in_flight = self.fetches.len(), "fetching cards");
        let request = self.cards.fetch();
        self.fetches.spawn(async move { (source, request.await) });
    }

    fn handle_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Tick(id) => self.handle_tick(id),
            SyncEvent::Channel { connection, signal } => {
                match self.push.on_signal(connection, signal, &self.scheduler) {
                    PushAction::StopPolling => {
                        if self.polling.stop() {
                            info!("push channel restored, polling stopped");
                        }
                    }
                    PushAction::StartPolling => {
                        if self.polling.start(&self.scheduler) {
                            info!("falling back to polling");
                        }
                    }
                    PushAction::Fetch => self.fetch(FetchSource::Push),
                    PushAction::Nothing => {}
                }
                self.update_mode();
            }
        }
    }

    fn handle_tick(&mut self, id: TaskId) {
        if self.polling.owns(id) {
            self.fetch(FetchSource::Poll);
        } else if self.heartbeat.owns(id) {
            self.fetch(FetchSource::Health);
        } else if self.push.owns_reconnect(id) {
            self.push.reconnect(&self.scheduler);
        } else {
            debug!(timer = ?id, "tick from a cancelled timer");
        }
    }

    fn update_mode(&mut self) {
        let mode = if self.polling.is_active() {
            SyncMode::Polling
        } else {
            SyncMode::Push
        };
        if mode != self.state.mode {
            info!(?mode, channel = ?self.push.state(), "delivery mode changed");
            self.state.mode = mode;
            self.publish();
        }
    }

    fn apply_fetch(&mut self, source: FetchSource, result: Result<Snapshot, FetchError>) {
        self.state.loading = false;

        match result {
            Ok(snapshot) => {
                let changed = self
                    .state
                    .last_snapshot
                    .as_ref()
                    .map_or(true, |previous| has_changed(previous, &snapshot));
                debug!(?source, cards = snapshot.len(), changed, "fetch completed");

                if changed {
                    self.state.last_snapshot = Some(Arc::new(snapshot));
                }
                // A push means the server says something happened, so the
                // timestamp moves even when the payload turned out identical.
                if changed || source == FetchSource::Push {
                    self.state.last_updated_at = Some((self.clock)());
                }
                self.state.error = None;
            }
            Err(err) => {
                warn!(?source, error = %err, "fetch failed");
                self.state.error = Some(err.to_string());
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let next = self.state.view();
        self.view.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    /// Stop every timer, close the connection, abort in-flight fetches and
    /// drop queued events.  Nothing is published afterwards.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.push.stop();
        self.polling.stop();
        self.heartbeat.stop();
        self.fetches.abort_all();
        self.events.close();
        while self.events.try_recv().is_ok() {}

        let counts = self.ledger();
        info!(
            timers = counts.active_timers(),
            connections = counts.open_connections(),
            "sync stopped"
        );
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[derive(Debug)]
pub enum SyncCommand {
    Refresh,
    Shutdown,
}

/// The presentation layer's end of a running orchestrator.
///
/// Dropping the handle shuts the orchestrator down and joins its thread.
pub struct SyncHandle {
    view: watch::Receiver<SyncView>,
    commands: mpsc::UnboundedSender<SyncCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SyncHandle {
    /// The latest view, if it changed since the last call.
    pub fn poll_view(&mut self) -> Option<SyncView> {
        match self.view.has_changed() {
            Ok(true) => Some(self.view.borrow_and_update().clone()),
            _ => None,
        }
    }

    pub fn refresh(&self) {
        let _ = self.commands.send(SyncCommand::Refresh);
    }

    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let _ = self.commands.send(SyncCommand::Shutdown);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| anyhow!("sync thread panicked")),
            None => Ok(()),
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "sync shutdown failed");
        }
    }
}

/// Start an orchestrator on its own thread.
pub fn spawn(
    cards: Arc<dyn CardSource>,
    push: Arc<dyn PushSource>,
    settings: SyncSettings,
) -> Result<SyncHandle> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (orchestrator, view) = Orchestrator::new(cards, push, settings);
    let (commands, commands_rx) = mpsc::unbounded_channel();

    let thread = thread::Builder::new()
        .name("sync".into())
        .spawn(move || runtime.block_on(orchestrator.run(commands_rx)))?;

    Ok(SyncHandle {
        view,
        commands,
        thread: Some(thread),
    })
}
