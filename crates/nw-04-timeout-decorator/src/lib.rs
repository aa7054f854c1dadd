//! # Timeout Decorator
//!
//! Wraps any [`Requester`] so every request it issues carries a deadline.
//!
//! The deadline is armed on the connection queue after the request is
//! registered and before it is sent, so a reply can never race ahead of its
//! own timer. A response, protocol error or transport error cancels the
//! timer and is forwarded unchanged; if the timer fires first the request
//! resolves with [`RequestError::Timeout`] and any later reply is dropped as
//! unknown.
//!
//! Decorators stack: the shortest deadline wins, and resolving the request
//! cancels every timer attached to it.
//!
//! [`RequestError::Timeout`]: shared_types::RequestError::Timeout

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod decorator;

pub use decorator::{with_timeout, TimeoutDecorator};
