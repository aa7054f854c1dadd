use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nw_01_execution_queue::{panic_message, ExecutionQueue, QueueHandle};
use shared_types::TimeoutConfig;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, trace};

use crate::manager::{Lifecycle, TimeoutManager};

/// Farthest deadline tracked; longer timeouts are clamped to it.
pub(crate) const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `from + duration` without overflowing the clock.
pub(crate) fn deadline_after(from: Instant, duration: Duration) -> Instant {
    from.checked_add(duration.min(FAR_FUTURE)).unwrap_or(from)
}

pub(crate) struct ScheduledTask {
    pub(crate) expiry: Instant,
    pub(crate) on_fail: Box<dyn FnOnce() + Send + 'static>,
    pub(crate) lifecycle: Arc<Lifecycle>,
}

struct Wake {
    at: Instant,
    handle: JoinHandle<()>,
}

/// State owned by the scheduler's private execution queue.
pub struct SchedulerState {
    queue: QueueHandle<SchedulerState>,
    precision: Duration,
    tasks: HashMap<u64, ScheduledTask>,
    wake: Option<Wake>,
}

impl SchedulerState {
    fn new(queue: QueueHandle<SchedulerState>, precision: Duration) -> Self {
        Self {
            queue,
            precision,
            tasks: HashMap::new(),
            wake: None,
        }
    }

    pub(crate) fn insert(&mut self, id: u64, task: ScheduledTask) {
        if task.lifecycle.is_cancelled() {
            return;
        }
        trace!(queue = %self.queue.name(), task = id, "Timeout armed");
        self.tasks.insert(id, task);
        self.schedule_wake();
    }

    pub(crate) fn reset(&mut self, id: u64, expiry: Instant) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.expiry = expiry;
            self.schedule_wake();
        }
    }

    pub(crate) fn remove(&mut self, id: u64) {
        if self.tasks.remove(&id).is_some() && self.tasks.is_empty() {
            if let Some(wake) = self.wake.take() {
                wake.handle.abort();
            }
        }
    }

    fn expire(&mut self) {
        let now = Instant::now();
        if self.wake.as_ref().is_some_and(|wake| wake.at <= now) {
            self.wake = None;
        }

        let mut due: Vec<(Instant, u64)> = self
            .tasks
            .iter()
            .filter(|(_, task)| task.expiry <= now)
            .map(|(id, task)| (task.expiry, *id))
            .collect();
        due.sort_unstable();

        for (_, id) in due {
            let Some(task) = self.tasks.remove(&id) else {
                continue;
            };
            if !task.lifecycle.try_fire() {
                continue;
            }
            debug!(queue = %self.queue.name(), task = id, "Timeout fired");
            let on_fail = task.on_fail;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(on_fail)) {
                error!(
                    queue = %self.queue.name(),
                    task = id,
                    panic = %panic_message(payload.as_ref()),
                    "Timeout callback panicked"
                );
            }
        }

        self.schedule_wake();
    }

    /// Make sure a wake is pending for the earliest deadline.
    ///
    /// A later wake is replaced; an earlier one is kept and re-evaluates
    /// when it fires.
    fn schedule_wake(&mut self) {
        let Some(earliest) = self.tasks.values().map(|task| task.expiry).min() else {
            return;
        };
        let at = deadline_after(earliest, self.precision);
        if let Some(wake) = &self.wake {
            if wake.at <= at {
                return;
            }
            wake.handle.abort();
        }

        let queue = self.queue.clone();
        let handle = tokio::spawn(async move {
            sleep_until(at).await;
            queue.post(SchedulerState::expire);
        });
        self.wake = Some(Wake { at, handle });
    }

    fn discard_all(&mut self) {
        if let Some(wake) = self.wake.take() {
            wake.handle.abort();
        }
        let discarded = self.tasks.len();
        self.tasks.clear();
        debug!(queue = %self.queue.name(), discarded, "Timeout scheduler closed");
    }
}

/// Many deadlines, one wake timer.
///
/// Cloning yields another handle to the same scheduler.
#[derive(Clone, Debug)]
pub struct TimeoutScheduler {
    queue: QueueHandle<SchedulerState>,
    precision: Duration,
    next_id: Arc<AtomicU64>,
}

impl TimeoutScheduler {
    /// Start a scheduler on the current tokio runtime.
    ///
    /// `precision` is added to every wake so nearby deadlines share one
    /// timer; callbacks fire at most `precision` late.
    pub fn new(precision: Duration) -> Self {
        Self::named("timeouts", precision)
    }

    /// Like [`new`](Self::new), with the queue name used in log events.
    pub fn named(name: &str, precision: Duration) -> Self {
        let queue = ExecutionQueue::spawn_with(name, |queue| SchedulerState::new(queue, precision));
        Self {
            queue: queue.into_handle(),
            precision,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(name: &str, config: &TimeoutConfig) -> Self {
        Self::named(name, config.precision)
    }

    /// Create an inactive deadline handle.
    pub fn set(&self, duration: Duration) -> TimeoutManager {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        TimeoutManager::new(id, duration, self.queue.clone())
    }

    pub fn precision(&self) -> Duration {
        self.precision
    }

    /// Number of armed, unfired deadlines.
    pub async fn active_tasks(&self) -> usize {
        self.queue.call(|state| state.tasks.len()).await.unwrap_or(0)
    }

    /// Discard every task without invoking callbacks and stop the timer.
    ///
    /// Managers created by this scheduler become inert.
    pub fn close(&self) {
        self.queue.close_with(SchedulerState::discard_all);
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}
