//! # Correlation
//!
//! Asynchronous request/response correlation over unreliable datagrams.
//!
//! A [`Connection`] owns one execution queue, one timeout scheduler, one
//! [`CorrelationRegistry`] and one [`Transport`]. Each request gets an id
//! from a lock-free [`CorrelationIdAllocator`]; the protocol's
//! [`CorrelationCodec`] writes that id into the request and reads it back out
//! of replies, which may arrive in any order, more than once, or never.
//!
//! ## Architecture
//!
//! - `domain/`: id spaces, allocation, the pending-request registry
//! - `ports/`: transport (outbound) and codec seams
//! - `service/`: [`Connection`] and the [`Requester`] trait that decorators
//!   such as the timeout decorator implement
//! - `adapters/`: UDP and in-process loopback transports
//!
//! ## Outcome rules
//!
//! - Every issued request resolves exactly once: response, protocol error,
//!   transport error, timeout (via a decorator) or `Closed`.
//! - Cancelled requests never resolve.
//! - Replies carrying an unknown or retired id are dropped with a `trace`
//!   event and surface no error.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use adapters::{
    LoopbackBuilder, LoopbackReply, LoopbackStats, UdpTransport, UdpTransportBuilder,
};
pub use domain::{
    CorrelationId, CorrelationIdAllocator, CorrelationRegistry, IdSpace, PendingRequest,
    RegistryStats, Respond, Responder,
};
pub use ports::{
    CorrelationCodec, Datagram, Decoded, EventSink, Transport, TransportBuilder, TransportEvent,
};
pub use service::{
    ArmHook, Connection, ConnectionBuilder, PendingResponse, RequestHandle, Requester,
};
