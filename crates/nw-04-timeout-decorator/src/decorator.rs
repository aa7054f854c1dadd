use std::time::Duration;

use nw_02_timeout_scheduler::{TimeoutManager, TimeoutScheduler};
use nw_03_correlation::{ArmHook, RequestHandle, Requester, Respond};
use shared_types::RequestError;
use tracing::debug;

/// Wrap `inner` so each request fails with `Timeout(timeout)` when no
/// outcome arrives in time.
pub fn with_timeout<R: Requester>(timeout: Duration, inner: R) -> TimeoutDecorator<R> {
    TimeoutDecorator { inner, timeout }
}

/// A [`Requester`] adding a per-request deadline to another requester.
#[derive(Debug)]
pub struct TimeoutDecorator<R> {
    inner: R,
    timeout: Duration,
}

impl<R: Requester> TimeoutDecorator<R> {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Requester> Requester for TimeoutDecorator<R> {
    type Request = R::Request;
    type Response = R::Response;

    fn issue_with(
        &self,
        request: R::Request,
        arm: Option<ArmHook>,
        respond: Respond<R::Response>,
    ) -> RequestHandle {
        let timeout = self.timeout;
        let timeouts = self.inner.timeouts().clone();
        let hook: ArmHook = Box::new(move |handle: &RequestHandle| {
            let mut managers = match arm {
                Some(outer) => outer(handle),
                None => Vec::new(),
            };
            managers.push(arm_deadline(&timeouts, timeout, handle));
            managers
        });
        self.inner.issue_with(request, Some(hook), respond)
    }

    fn timeouts(&self) -> &TimeoutScheduler {
        self.inner.timeouts()
    }

    fn close(&self) {
        self.inner.close();
    }
}

fn arm_deadline(
    timeouts: &TimeoutScheduler,
    timeout: Duration,
    handle: &RequestHandle,
) -> TimeoutManager {
    let manager = timeouts.set(timeout);
    let owner = handle.clone();
    manager.run(move || {
        debug!(id = %owner.id(), timeout_ms = timeout.as_millis() as u64, "Request timed out");
        owner.fail(RequestError::Timeout(timeout));
    });
    manager
}
