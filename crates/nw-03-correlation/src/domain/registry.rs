//! Pending request registry.
//!
//! Maps correlation ids to the callbacks waiting for them. The registry is
//! owned by a connection's execution queue and is never shared across
//! threads, so it is a plain `HashMap`.

use std::collections::HashMap;
use std::fmt;

use nw_02_timeout_scheduler::TimeoutManager;
use shared_types::RequestError;
use tokio::time::{Duration, Instant};
use tracing::{debug, trace};

use super::id::CorrelationId;

/// Callback receiving the single outcome of a request.
pub type Respond<R> = Box<dyn FnOnce(Result<R, RequestError>) + Send + 'static>;

/// Owns a [`Respond`] callback and guarantees it runs at most once.
///
/// A responder dropped without being used delivers
/// [`RequestError::Closed`], so a request lost with a closing queue still
/// reports an outcome. [`discard`](Self::discard) is the only way to drop the
/// callback silently.
pub struct Responder<R> {
    callback: Option<Respond<R>>,
}

impl<R> Responder<R> {
    pub fn new(callback: Respond<R>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    pub fn deliver(mut self, result: Result<R, RequestError>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }

    /// Drop the callback without invoking it.
    pub fn discard(mut self) {
        self.callback = None;
    }
}

impl<R> Drop for Responder<R> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(Err(RequestError::Closed));
        }
    }
}

impl<R> fmt::Debug for Responder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

/// A request waiting for its response
#[derive(Debug)]
pub struct PendingRequest<R> {
    id: CorrelationId,
    created_at: Instant,
    responder: Responder<R>,
    timeouts: Vec<TimeoutManager>,
}

impl<R> PendingRequest<R> {
    pub fn new(id: CorrelationId, respond: Respond<R>) -> Self {
        Self::from_responder(id, Responder::new(respond))
    }

    pub fn from_responder(id: CorrelationId, responder: Responder<R>) -> Self {
        Self {
            id,
            created_at: Instant::now(),
            responder,
            timeouts: Vec::new(),
        }
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// Time since registration.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Associate timeout handles; they are cancelled when the request
    /// resolves.
    pub fn attach(&mut self, timeouts: impl IntoIterator<Item = TimeoutManager>) {
        self.timeouts.extend(timeouts);
    }

    pub fn timeouts(&self) -> &[TimeoutManager] {
        &self.timeouts
    }

    /// Cancel associated timeouts and deliver `result`.
    pub fn finish(self, result: Result<R, RequestError>) {
        let Self {
            id,
            created_at,
            responder,
            timeouts,
        } = self;
        for timeout in &timeouts {
            timeout.cancel();
        }
        debug!(
            id = %id,
            ok = result.is_ok(),
            elapsed_ms = created_at.elapsed().as_millis() as u64,
            "Completed pending request"
        );
        responder.deliver(result);
    }

    /// Cancel associated timeouts and drop the callback silently.
    pub fn discard(self) {
        for timeout in &self.timeouts {
            timeout.cancel();
        }
        self.responder.discard();
    }
}

/// Registration refused because the id is still outstanding.
#[derive(Debug)]
pub struct Occupied<R> {
    pub id: CorrelationId,
    pub rejected: PendingRequest<R>,
}

/// Counters for registry activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Total requests registered
    pub registered: u64,
    /// Total requests resolved with a result or error
    pub completed: u64,
    /// Total requests retired without a callback
    pub cancelled: u64,
    /// Responses dropped because their id was not pending
    pub unknown: u64,
    /// Registrations refused because the id was still outstanding
    pub collisions: u64,
}

/// Outstanding requests for one connection, keyed by correlation id.
pub struct CorrelationRegistry<R> {
    pending: HashMap<CorrelationId, PendingRequest<R>>,
    stats: RegistryStats,
}

impl<R> Default for CorrelationRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> CorrelationRegistry<R> {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            stats: RegistryStats::default(),
        }
    }

    /// Register a pending request under its id.
    ///
    /// An id that is still outstanding (the id space wrapped around) is
    /// refused and the new request is handed back untouched.
    pub fn register(&mut self, pending: PendingRequest<R>) -> Result<(), Occupied<R>> {
        let id = pending.id();
        if self.pending.contains_key(&id) {
            self.stats.collisions += 1;
            return Err(Occupied {
                id,
                rejected: pending,
            });
        }
        self.pending.insert(id, pending);
        self.stats.registered += 1;
        trace!(id = %id, pending = self.pending.len(), "Registered pending request");
        Ok(())
    }

    /// Attach timeout handles to a pending request.
    pub fn attach(&mut self, id: CorrelationId, timeouts: Vec<TimeoutManager>) -> bool {
        match self.pending.get_mut(&id) {
            Some(pending) => {
                pending.attach(timeouts);
                true
            }
            None => {
                for timeout in &timeouts {
                    timeout.cancel();
                }
                false
            }
        }
    }

    /// Remove `id` and hand back its pending entry, or `None` when the id
    /// is unknown (already resolved, cancelled, or never registered).
    pub fn take(&mut self, id: CorrelationId) -> Option<PendingRequest<R>> {
        let pending = self.pending.remove(&id);
        if pending.is_none() {
            self.stats.unknown += 1;
            trace!(id = %id, "Response for unknown or expired correlation ID");
        }
        pending
    }

    /// Resolve `id` with `result`, retiring it.
    ///
    /// Returns `false` when the id is not pending (a duplicate, late or
    /// foreign response); nothing is delivered in that case.
    pub fn complete(&mut self, id: CorrelationId, result: Result<R, RequestError>) -> bool {
        match self.take(id) {
            Some(pending) => {
                self.stats.completed += 1;
                pending.finish(result);
                true
            }
            None => false,
        }
    }

    /// Retire `id` without invoking its callback.
    pub fn cancel(&mut self, id: CorrelationId) -> bool {
        match self.pending.remove(&id) {
            Some(pending) => {
                self.stats.cancelled += 1;
                pending.discard();
                true
            }
            None => false,
        }
    }

    /// Remove every pending request, oldest id first.
    pub fn drain(&mut self) -> Vec<PendingRequest<R>> {
        let mut drained: Vec<_> = self.pending.drain().map(|(_, pending)| pending).collect();
        drained.sort_by_key(PendingRequest::id);
        drained
    }

    /// Fail every pending request with a clone of `error`.
    pub fn fail_all(&mut self, error: &RequestError) -> usize {
        let drained = self.drain();
        let count = drained.len();
        self.stats.completed += count as u64;
        for pending in drained {
            pending.finish(Err(error.clone()));
        }
        count
    }

    pub fn contains(&self, id: CorrelationId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        self.stats
    }
}
