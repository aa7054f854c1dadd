//! # Timeout Scheduler
//!
//! Tracks many independently resettable deadlines with a single wake timer.
//!
//! All tasks live in the state of a private execution queue. One tokio task
//! sleeps until the earliest deadline plus the configured precision, then
//! posts an expiry pass back onto that queue. The pass fires every due
//! callback and re-arms the wake for the next earliest deadline.
//!
//! ```rust,ignore
//! let scheduler = TimeoutScheduler::new(Duration::from_millis(100));
//! let timeout = scheduler.set(Duration::from_secs(1));
//! timeout.run(|| tracing::warn!("no reply"));
//! timeout.reset();   // deadline = now + 1s
//! timeout.cancel();  // callback can no longer fire
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod manager;
mod scheduler;

pub use manager::TimeoutManager;
pub use scheduler::TimeoutScheduler;
