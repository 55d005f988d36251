//! Polling fallback.
//!
//! While the push channel is down the orchestrator keeps data flowing by
//! re-fetching on a fixed interval.  Polling and push are never both the
//! active delivery mode: the push manager asks for polling to start when the
//! channel fails and to stop once it is open again.
//!
//! There is at most one polling timer.  `start` and `stop` are both
//! idempotent, so the push manager can call them on every transition without
//! tracking whether polling is already running.

use std::time::Duration;

use tracing::debug;

use super::schedule::{Scheduler, TaskId, TimerHandle};

/// How often the fallback re-fetches.
pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

pub struct PollingFallback {
    interval: Duration,
    timer: Option<TimerHandle>,
}

impl PollingFallback {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timer: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.timer.is_some()
    }

    /// Returns `true` if this call started polling.
    pub fn start(&mut self, scheduler: &Scheduler) -> bool {
        if self.timer.is_some() {
            return false;
        }
        let timer = scheduler.every(self.interval);
        debug!(timer = ?timer.id(), interval = ?self.interval, "polling started");
        self.timer = Some(timer);
        true
    }

    /// Returns `true` if polling was running.
    pub fn stop(&mut self) -> bool {
        self.timer.take().is_some()
    }

    /// Whether `id` is the current polling timer.  Ticks from a timer that
    /// has been stopped may still be queued and must be ignored.
    pub fn owns(&self, id: TaskId) -> bool {
        self.timer.as_ref().is_some_and(|t| t.id() == id)
    }
}
