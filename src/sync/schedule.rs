//! Owned timer and connection handles.
//!
//! Every timer and every push connection is a Tokio task that does nothing
//! but post [`SyncEvent`]s back to the orchestrator's queue.  The task is
//! owned by exactly one handle; dropping the handle aborts the task.  A
//! shared [`ResourceLedger`] counts creations and releases so leaks show up
//! as `created != released`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::ChannelError;
use crate::source::{EventStream, PushEvent, ServerEvent};

/// Identifies one timer or connection for its whole life.  Ids are never
/// reused, so an event from a handle that has since been replaced can be
/// recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

#[derive(Debug)]
pub enum SyncEvent {
    /// A timer fired.
    Tick(TaskId),
    /// Something happened on a push connection.
    Channel { connection: TaskId, signal: ChannelSignal },
}

#[derive(Debug)]
pub enum ChannelSignal {
    Opened,
    Message(ServerEvent),
    /// Terminal: the connection task exits after sending this.
    Failed(ChannelError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceKind {
    Timer,
    Connection,
}

#[derive(Debug, Default)]
struct Counters {
    timers_created: AtomicUsize,
    timers_released: AtomicUsize,
    connections_created: AtomicUsize,
    connections_released: AtomicUsize,
}

/// Point-in-time copy of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerCounts {
    pub timers_created: usize,
    pub timers_released: usize,
    pub connections_created: usize,
    pub connections_released: usize,
}

impl LedgerCounts {
    pub fn active_timers(&self) -> usize {
        self.timers_created - self.timers_released
    }

    pub fn open_connections(&self) -> usize {
        self.connections_created - self.connections_released
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    counts: Arc<Counters>,
}

impl ResourceLedger {
    pub fn counts(&self) -> LedgerCounts {
        let c = &self.counts;
        LedgerCounts {
            timers_created: c.timers_created.load(Ordering::SeqCst),
            timers_released: c.timers_released.load(Ordering::SeqCst),
            connections_created: c.connections_created.load(Ordering::SeqCst),
            connections_released: c.connections_released.load(Ordering::SeqCst),
        }
    }

    fn created(&self, kind: ResourceKind) {
        match kind {
            ResourceKind::Timer => &self.counts.timers_created,
            ResourceKind::Connection => &self.counts.connections_created,
        }
        .fetch_add(1, Ordering::SeqCst);
    }

    fn released(&self, kind: ResourceKind) {
        match kind {
            ResourceKind::Timer => &self.counts.timers_released,
            ResourceKind::Connection => &self.counts.connections_released,
        }
        .fetch_add(1, Ordering::SeqCst);
    }
}

struct OwnedTask {
    id: TaskId,
    kind: ResourceKind,
    task: JoinHandle<()>,
    ledger: ResourceLedger,
}

impl Drop for OwnedTask {
    fn drop(&mut self) {
        self.task.abort();
        self.ledger.released(self.kind);
    }
}

/// A pending one-shot or repeating timer.  Dropping it cancels the timer.
pub struct TimerHandle(OwnedTask);

impl TimerHandle {
    pub fn id(&self) -> TaskId {
        self.0.id
    }
}

/// A live push connection.  Dropping it closes the connection.
pub struct ConnectionHandle(OwnedTask);

impl ConnectionHandle {
    pub fn id(&self) -> TaskId {
        self.0.id
    }
}

/// Creates timers and connections wired to the orchestrator's event queue.
///
/// Must be used from inside a Tokio runtime.
pub struct Scheduler {
    events: UnboundedSender<SyncEvent>,
    ledger: ResourceLedger,
    next_id: AtomicU64,
}

impl Scheduler {
    pub fn new(events: UnboundedSender<SyncEvent>, ledger: ResourceLedger) -> Self {
        Self {
            events,
            ledger,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Fire [`SyncEvent::Tick`] every `period`, first one `period` from now.
    pub fn every(&self, period: Duration) -> TimerHandle {
        let events = self.events.clone();
        let start = Instant::now() + period;
        TimerHandle(self.own(ResourceKind::Timer, move |id| async move {
            let mut ticks = time::interval_at(start, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if events.send(SyncEvent::Tick(id)).is_err() {
                    break;
                }
            }
        }))
    }

    /// Fire a single [`SyncEvent::Tick`] after `delay`.
    pub fn after(&self, delay: Duration) -> TimerHandle {
        let events = self.events.clone();
        let deadline = Instant::now() + delay;
        TimerHandle(self.own(ResourceKind::Timer, move |id| async move {
            time::sleep_until(deadline).await;
            let _ = events.send(SyncEvent::Tick(id));
        }))
    }

    /// Drive `stream`, forwarding everything it yields as
    /// [`SyncEvent::Channel`].  An error or the end of the stream is
    /// forwarded as [`ChannelSignal::Failed`] and ends the task.
    pub fn connect(&self, stream: EventStream) -> ConnectionHandle {
        let events = self.events.clone();
        ConnectionHandle(self.own(ResourceKind::Connection, move |id| async move {
            let mut stream = stream;
            loop {
                let (signal, last) = match stream.next().await {
                    Some(Ok(PushEvent::Opened)) => (ChannelSignal::Opened, false),
                    Some(Ok(PushEvent::Message(event))) => (ChannelSignal::Message(event), false),
                    Some(Err(err)) => (ChannelSignal::Failed(err), true),
                    None => (ChannelSignal::Failed(ChannelError::Closed), true),
                };
                let sent = events.send(SyncEvent::Channel { connection: id, signal });
                if sent.is_err() || last {
                    break;
                }
            }
        }))
    }

    fn own<F, Fut>(&self, kind: ResourceKind, task: F) -> OwnedTask
    where
        F: FnOnce(TaskId) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let task = tokio::spawn(task(id));
        self.ledger.created(kind);
        OwnedTask {
            id,
            kind,
            task,
            ledger: self.ledger.clone(),
        }
    }
}
