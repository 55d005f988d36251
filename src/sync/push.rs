//! Push channel manager.
//!
//! Owns the single live subscription to the backend's event stream.
//!
//! ```text
//!            start()            Opened
//!  Closed ───────────► Connecting ──────► Open
//!    ▲                     │               │
//!    │ stop()              │ Failed        │ Failed
//!    │                     ▼               ▼
//!    └──────────────── Reconnecting ◄──────┘
//!                          │
//!                          └── backoff elapsed ──► Connecting
//! ```
//!
//! The manager never fetches or touches polling itself.  Each signal returns
//! a [`PushAction`] and the orchestrator carries it out, which keeps the
//! decision of "did anything change" in one place.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::schedule::{ChannelSignal, ConnectionHandle, Scheduler, TaskId, TimerHandle};
use crate::source::PushSource;

/// Fixed delay before re-opening a failed channel.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// The server-sent event that means "cards changed, pull again".
pub const NEWS_UPDATE_EVENT: &str = "news_update";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Connecting,
    Open,
    Reconnecting,
}

/// What the orchestrator should do after a channel signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushAction {
    Nothing,
    StopPolling,
    StartPolling,
    Fetch,
}

pub struct PushChannel {
    source: Arc<dyn PushSource>,
    backoff: Duration,
    state: ChannelState,
    connection: Option<ConnectionHandle>,
    reconnect: Option<TimerHandle>,
}

impl PushChannel {
    pub fn new(source: Arc<dyn PushSource>, backoff: Duration) -> Self {
        Self {
            source,
            backoff,
            state: ChannelState::Closed,
            connection: None,
            reconnect: None,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Open the channel unless it is already connecting or open.  A pending
    /// reconnect is superseded.
    pub fn start(&mut self, scheduler: &Scheduler) {
        if matches!(self.state, ChannelState::Connecting | ChannelState::Open) {
            trace!(state = ?self.state, "push channel already started");
            return;
        }
        self.reconnect = None;

        let connection = scheduler.connect(self.source.subscribe());
        info!(connection = ?connection.id(), "connecting push channel");
        self.connection = Some(connection);
        self.state = ChannelState::Connecting;
    }

    /// Close the connection and cancel any pending reconnect.
    pub fn stop(&mut self) {
        if self.connection.take().is_some() || self.reconnect.take().is_some() {
            debug!("push channel stopped");
        }
        self.state = ChannelState::Closed;
    }

    pub fn on_signal(
        &mut self,
        connection: TaskId,
        signal: ChannelSignal,
        scheduler: &Scheduler,
    ) -> PushAction {
        if self.connection.as_ref().map(ConnectionHandle::id) != Some(connection) {
            trace!(?connection, "signal from a closed connection");
            return PushAction::Nothing;
        }

        match signal {
            ChannelSignal::Opened => {
                info!(?connection, "push channel open");
                self.state = ChannelState::Open;
                PushAction::StopPolling
            }
            ChannelSignal::Message(event)
                if event.name == NEWS_UPDATE_EVENT && self.state == ChannelState::Open =>
            {
                debug!(id = ?event.id, "news update signalled");
                PushAction::Fetch
            }
            ChannelSignal::Message(event) => {
                trace!(name = %event.name, state = ?self.state, "ignoring push event");
                PushAction::Nothing
            }
            ChannelSignal::Failed(err) => {
                warn!(?connection, error = %err, backoff = ?self.backoff, "push channel failed, polling until reconnect");
                self.connection = None;
                self.state = ChannelState::Reconnecting;
                self.schedule_reconnect(scheduler);
                PushAction::StartPolling
            }
        }
    }

    pub fn owns_reconnect(&self, id: TaskId) -> bool {
        self.reconnect.as_ref().is_some_and(|t| t.id() == id)
    }

    /// The backoff elapsed: try the channel again.
    pub fn reconnect(&mut self, scheduler: &Scheduler) {
        self.reconnect = None;
        self.state = ChannelState::Closed;
        self.start(scheduler);
    }

    fn schedule_reconnect(&mut self, scheduler: &Scheduler) {
        // cancel before reschedule
        drop(self.reconnect.take());
        self.reconnect = Some(scheduler.after(self.backoff));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fakes::FakePush;
    use crate::source::ServerEvent;
    use crate::sync::schedule::{ResourceLedger, SyncEvent};
    use tokio::sync::mpsc;

    fn setup() -> (PushChannel, Arc<FakePush>, Scheduler, mpsc::UnboundedReceiver<SyncEvent>) {
        let source = Arc::new(FakePush::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let sched = Scheduler::new(tx, ResourceLedger::default());
        (PushChannel::new(source.clone(), RECONNECT_BACKOFF), source, sched, rx)
    }

    fn current(push: &PushChannel) -> TaskId {
        push.connection.as_ref().map(ConnectionHandle::id).unwrap()
    }

    fn update() -> ChannelSignal {
        ChannelSignal::Message(ServerEvent {
            name: NEWS_UPDATE_EVENT.into(),
            data: String::new(),
            id: None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_opens_one_connection() {
        let (mut push, source, sched, _rx) = setup();

        push.start(&sched);
        push.start(&sched);

        assert_eq!(push.state(), ChannelState::Connecting);
        assert_eq!(source.subscriptions(), 1);
        assert_eq!(sched.ledger().counts().open_connections(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn open_asks_to_stop_polling() {
        let (mut push, _source, sched, _rx) = setup();
        push.start(&sched);
        let id = current(&push);

        assert_eq!(push.on_signal(id, ChannelSignal::Opened, &sched), PushAction::StopPolling);
        assert_eq!(push.state(), ChannelState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn news_update_fetches_only_when_open() {
        let (mut push, _source, sched, _rx) = setup();
        push.start(&sched);
        let id = current(&push);

        assert_eq!(push.on_signal(id, update(), &sched), PushAction::Nothing);
        push.on_signal(id, ChannelSignal::Opened, &sched);
        assert_eq!(push.on_signal(id, update(), &sched), PushAction::Fetch);
    }

    #[tokio::test(start_paused = true)]
    async fn other_events_are_ignored() {
        let (mut push, _source, sched, _rx) = setup();
        push.start(&sched);
        let id = current(&push);
        push.on_signal(id, ChannelSignal::Opened, &sched);

        let ping = ChannelSignal::Message(ServerEvent {
            name: "ping".into(),
            data: String::new(),
            id: None,
        });
        assert_eq!(push.on_signal(id, ping, &sched), PushAction::Nothing);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_starts_polling_and_schedules_one_reconnect() {
        let (mut push, _source, sched, _rx) = setup();
        push.start(&sched);
        let id = current(&push);

        let action = push.on_signal(id, ChannelSignal::Failed(crate::error::ChannelError::Closed), &sched);

        assert_eq!(action, PushAction::StartPolling);
        assert_eq!(push.state(), ChannelState::Reconnecting);
        let counts = sched.ledger().counts();
        assert_eq!(counts.open_connections(), 0);
        assert_eq!(counts.active_timers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn signals_from_old_connection_are_ignored() {
        let (mut push, source, sched, _rx) = setup();
        push.start(&sched);
        let old = current(&push);
        push.on_signal(old, ChannelSignal::Failed(crate::error::ChannelError::Closed), &sched);
        push.reconnect(&sched);
        assert_eq!(source.subscriptions(), 2);

        assert_eq!(push.on_signal(old, ChannelSignal::Opened, &sched), PushAction::Nothing);
        assert_eq!(push.state(), ChannelState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_start_supersedes_pending_reconnect() {
        let (mut push, _source, sched, _rx) = setup();
        push.start(&sched);
        let id = current(&push);
        push.on_signal(id, ChannelSignal::Failed(crate::error::ChannelError::Closed), &sched);
        assert_eq!(sched.ledger().counts().active_timers(), 1);

        push.start(&sched);
        assert_eq!(sched.ledger().counts().active_timers(), 0);
        assert_eq!(push.state(), ChannelState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_releases_everything_and_is_idempotent() {
        let (mut push, _source, sched, _rx) = setup();
        push.start(&sched);
        let id = current(&push);
        push.on_signal(id, ChannelSignal::Failed(crate::error::ChannelError::Closed), &sched);
        push.start(&sched);

        push.stop();
        push.stop();

        assert_eq!(push.state(), ChannelState::Closed);
        let counts = sched.ledger().counts();
        assert_eq!(counts.timers_created, counts.timers_released);
        assert_eq!(counts.connections_created, counts.connections_released);
    }
}
