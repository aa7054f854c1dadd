//! Per-deadline handle returned by [`TimeoutScheduler::set`].
//!
//! [`TimeoutScheduler::set`]: crate::TimeoutScheduler::set

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nw_01_execution_queue::QueueHandle;
use tokio::time::Instant;
use tracing::trace;

use crate::scheduler::{deadline_after, ScheduledTask, SchedulerState};

pub(crate) const IDLE: u8 = 0;
pub(crate) const ARMED: u8 = 1;
pub(crate) const FIRED: u8 = 2;
pub(crate) const CANCELLED: u8 = 3;

/// Lifecycle shared between a manager and its scheduled task.
///
/// Transitions: `IDLE -> ARMED -> FIRED` or `IDLE | ARMED -> CANCELLED`.
/// Firing and cancelling race on the same compare-exchange, so exactly one
/// of them wins.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle(AtomicU8);

impl Lifecycle {
    fn get(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.0
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.get() == CANCELLED
    }

    pub(crate) fn try_fire(&self) -> bool {
        self.transition(ARMED, FIRED)
    }
}

/// Handle to one deadline.
///
/// Inactive until [`run`](Self::run). Cloning yields another handle to the
/// same deadline.
#[derive(Clone)]
pub struct TimeoutManager {
    id: u64,
    duration: Duration,
    queue: QueueHandle<SchedulerState>,
    lifecycle: Arc<Lifecycle>,
}

impl TimeoutManager {
    pub(crate) fn new(id: u64, duration: Duration, queue: QueueHandle<SchedulerState>) -> Self {
        Self {
            id,
            duration,
            queue,
            lifecycle: Arc::new(Lifecycle::default()),
        }
    }

    /// Scheduler-local task id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Configured timeout.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Arm the deadline at `now + duration` with `on_fail` as its callback.
    ///
    /// Durations beyond about thirty years are clamped.
    ///
    /// Only the first call arms; later calls are no-ops.
    pub fn run<F>(&self, on_fail: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.lifecycle.transition(IDLE, ARMED) {
            trace!(task = self.id, "Timeout already armed or cancelled");
            return;
        }
        let task = ScheduledTask {
            expiry: deadline_after(Instant::now(), self.duration),
            on_fail: Box::new(on_fail),
            lifecycle: Arc::clone(&self.lifecycle),
        };
        let id = self.id;
        self.queue.post(move |state| state.insert(id, task));
    }

    /// Push the deadline to `now + duration`, measured at this call.
    ///
    /// No-op unless armed and not yet fired.
    pub fn reset(&self) {
        if self.lifecycle.get() != ARMED {
            return;
        }
        let expiry = deadline_after(Instant::now(), self.duration);
        let id = self.id;
        self.queue.post(move |state| state.reset(id, expiry));
    }

    /// Remove the deadline. Once this returns the callback will not fire,
    /// unless it had already started.
    ///
    /// Returns `true` if this call performed the cancellation.
    pub fn cancel(&self) -> bool {
        loop {
            let current = self.lifecycle.get();
            match current {
                IDLE | ARMED => {
                    if self.lifecycle.transition(current, CANCELLED) {
                        if current == ARMED {
                            let id = self.id;
                            self.queue.post(move |state| state.remove(id));
                        }
                        return true;
                    }
                }
                _ => return false,
            }
        }
    }

    /// Armed and still pending.
    pub fn is_armed(&self) -> bool {
        self.lifecycle.get() == ARMED
    }

    pub fn is_cancelled(&self) -> bool {
        self.lifecycle.is_cancelled()
    }

    pub fn has_fired(&self) -> bool {
        self.lifecycle.get() == FIRED
    }
}

impl fmt::Debug for TimeoutManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutManager")
            .field("id", &self.id)
            .field("duration", &self.duration)
            .field("lifecycle", &self.lifecycle.get())
            .finish()
    }
}
