//! # Execution Queue
//!
//! Serializes work against a piece of owned state on a single worker task.
//!
//! Every connection owns one queue. All mutation of the connection's state
//! (the correlation registry, the timeout task set) happens inside tasks
//! posted to that queue, so the state needs no locks.
//!
//! ## Guarantees
//!
//! - Tasks run one at a time, in submission order, with exclusive `&mut S`.
//! - A task may post further tasks; they run after the current backlog.
//! - Work accepted before [`QueueHandle::close`] is drained before the close
//!   hook runs. Work posted afterwards is dropped silently.
//! - A panicking task is logged and contained; the worker keeps running.
//!
//! ```text
//!   post() ──┐
//!   post() ──┼──► [ mpsc ] ──► worker: task(&mut S); task(&mut S); ...
//!   call() ──┘                         │
//!                                      └─ close hook(&mut S), exit
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod queue;

pub use queue::{panic_message, ExecutionQueue, QueueHandle, Task};
