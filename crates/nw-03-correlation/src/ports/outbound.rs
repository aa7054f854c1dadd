//! # Driven Ports (Outbound SPI)
//!
//! Datagram transport used by a connection. Implementations deliver inbound
//! traffic as [`TransportEvent`]s; the connection marshals every event onto
//! its own execution queue before touching any state.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use shared_types::TransportError;
use tokio::sync::mpsc;

/// One received datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub from: SocketAddr,
    pub payload: Bytes,
}

/// Inbound notifications from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Received(Datagram),
    /// A receive-side failure not attributable to any single request.
    Failed(TransportError),
    /// The transport stopped; the owning connection closes.
    Closed,
}

/// Where a transport pushes its events.
pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// An open datagram transport.
///
/// # Thread Safety
///
/// Sends are issued from spawned tasks, so implementations must be
/// `Send + Sync`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one datagram to `to`.
    async fn send(&self, to: SocketAddr, payload: Bytes) -> Result<(), TransportError>;

    /// Local address, when bound to one.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Stop receiving and release the socket. Idempotent.
    fn close(&self);
}

/// Opens transports for connections.
#[async_trait]
pub trait TransportBuilder: Send + Sync {
    /// Open a transport that reports inbound traffic to `events`.
    async fn connect(&self, events: EventSink) -> Result<Arc<dyn Transport>, TransportError>;
}
