//! The `Requester` seam shared by connections and decorators.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use nw_02_timeout_scheduler::{TimeoutManager, TimeoutScheduler};
use shared_types::RequestError;
use tokio::sync::oneshot;

use crate::domain::{CorrelationId, Respond};

/// Runs on the connection's execution queue after the request is
/// registered and before it is sent. Returned timeout handles are attached
/// to the pending entry and cancelled when it resolves.
pub type ArmHook = Box<dyn FnOnce(&RequestHandle) -> Vec<TimeoutManager> + Send + 'static>;

/// Posts request-level operations back onto the owning connection queue.
pub(crate) trait PendingControl: Send + Sync {
    fn fail(&self, id: CorrelationId, error: RequestError);
    fn cancel(&self, id: CorrelationId);
}

/// Handle to one issued request.
#[derive(Clone)]
pub struct RequestHandle {
    id: CorrelationId,
    control: Arc<dyn PendingControl>,
}

impl RequestHandle {
    pub(crate) fn new(id: CorrelationId, control: Arc<dyn PendingControl>) -> Self {
        Self { id, control }
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// Retire the request silently: its callback will never run. Idempotent.
    pub fn cancel(&self) {
        self.control.cancel(self.id);
    }

    /// Resolve the request with `error` if it is still pending.
    pub fn fail(&self, error: RequestError) {
        self.control.fail(self.id, error);
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle").field("id", &self.id).finish()
    }
}

/// Issues correlated requests.
///
/// Implemented by [`Connection`](crate::Connection) and by decorators that
/// wrap another `Requester` with the same request and response types.
pub trait Requester: Send + Sync {
    type Request: Send + 'static;
    type Response: Send + 'static;

    /// Issue `request`. `respond` receives exactly one outcome, unless the
    /// request is cancelled through the returned handle.
    fn issue_with(
        &self,
        request: Self::Request,
        arm: Option<ArmHook>,
        respond: Respond<Self::Response>,
    ) -> RequestHandle;

    /// Scheduler used for this requester's deadlines.
    fn timeouts(&self) -> &TimeoutScheduler;

    /// Fail everything pending with [`RequestError::Closed`] and release
    /// resources.
    fn close(&self);

    fn issue(&self, request: Self::Request, respond: Respond<Self::Response>) -> RequestHandle {
        self.issue_with(request, None, respond)
    }

    /// Issue `request` and await its outcome.
    ///
    /// Dropping the returned future cancels the request.
    fn request(&self, request: Self::Request) -> PendingResponse<Self::Response> {
        let (sender, receiver) = oneshot::channel();
        let handle = self.issue(
            request,
            Box::new(move |result| {
                let _ = sender.send(result);
            }),
        );
        PendingResponse {
            handle,
            receiver,
            done: false,
        }
    }
}

/// Future returned by [`Requester::request`].
pub struct PendingResponse<R> {
    handle: RequestHandle,
    receiver: oneshot::Receiver<Result<R, RequestError>>,
    done: bool,
}

impl<R> PendingResponse<R> {
    pub fn handle(&self) -> &RequestHandle {
        &self.handle
    }

    pub fn id(&self) -> CorrelationId {
        self.handle.id()
    }
}

impl<R> Future for PendingResponse<R> {
    type Output = Result<R, RequestError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(result) => {
                this.done = true;
                // A cancelled request drops its callback
                Poll::Ready(result.unwrap_or(Err(RequestError::Closed)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<R> Drop for PendingResponse<R> {
    fn drop(&mut self) {
        if !self.done {
            self.handle.cancel();
        }
    }
}
