//! Health heartbeat: a slow, unconditional re-fetch.
//!
//! Runs for the orchestrator's whole life regardless of delivery mode, so a
//! push channel that is open but silently not delivering cannot leave the
//! cards stale for longer than one period.

use std::time::Duration;

use tracing::debug;

use super::schedule::{Scheduler, TaskId, TimerHandle};

pub const HEALTH_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct Heartbeat {
    interval: Duration,
    timer: Option<TimerHandle>,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timer: None,
        }
    }

    pub fn start(&mut self, scheduler: &Scheduler) {
        if self.timer.is_none() {
            let timer = scheduler.every(self.interval);
            debug!(timer = ?timer.id(), interval = ?self.interval, "heartbeat started");
            self.timer = Some(timer);
        }
    }

    pub fn stop(&mut self) {
        self.timer = None;
    }

    pub fn owns(&self, id: TaskId) -> bool {
        self.timer.as_ref().is_some_and(|t| t.id() == id)
    }
}
