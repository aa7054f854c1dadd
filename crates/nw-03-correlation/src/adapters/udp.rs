// ============================================================================
// UdpTransport - Production datagram transport
// ============================================================================

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use shared_types::TransportError;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::ports::{Datagram, EventSink, Transport, TransportBuilder, TransportEvent};

/// Largest UDP payload.
pub const MAX_DATAGRAM: usize = 65_535;

/// Binds a tokio `UdpSocket` per connection.
#[derive(Debug, Clone)]
pub struct UdpTransportBuilder {
    bind: SocketAddr,
    buffer_size: usize,
}

impl UdpTransportBuilder {
    /// Bind to an explicit local address (e.g. "0.0.0.0:0").
    pub fn bind(bind: SocketAddr) -> Self {
        Self {
            bind,
            buffer_size: MAX_DATAGRAM,
        }
    }

    /// Bind an ephemeral port on the unspecified address of `target`'s family.
    pub fn for_target(target: SocketAddr) -> Self {
        let ip: IpAddr = match target {
            SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
            SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
        };
        Self::bind(SocketAddr::new(ip, 0))
    }

    /// Receive buffer size; longer datagrams are truncated by the kernel.
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.clamp(1, MAX_DATAGRAM);
        self
    }
}

#[async_trait]
impl TransportBuilder for UdpTransportBuilder {
    async fn connect(&self, events: EventSink) -> Result<Arc<dyn Transport>, TransportError> {
        let socket = UdpSocket::bind(self.bind)
            .await
            .map_err(|e| TransportError::io("bind", &e))?;
        let socket = Arc::new(socket);
        let local_addr = socket.local_addr().ok();
        let shutdown = Arc::new(Notify::new());

        tokio::spawn(receive_loop(
            Arc::clone(&socket),
            events,
            Arc::clone(&shutdown),
            self.buffer_size,
        ));

        debug!(local = ?local_addr, "UDP transport bound");
        Ok(Arc::new(UdpTransport {
            socket,
            local_addr,
            shutdown,
            closed: AtomicBool::new(false),
        }))
    }
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    events: EventSink,
    shutdown: Arc<Notify>,
    buffer_size: usize,
) {
    let mut buffer = vec![0u8; buffer_size];
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            received = socket.recv_from(&mut buffer) => {
                let event = match received {
                    Ok((len, from)) => {
                        trace!(from = %from, bytes = len, "Datagram received");
                        TransportEvent::Received(Datagram {
                            from,
                            payload: Bytes::copy_from_slice(&buffer[..len]),
                        })
                    }
                    Err(e) => TransportEvent::Failed(TransportError::io("recv", &e)),
                };
                if events.send(event).is_err() {
                    break;
                }
            }
        }
    }
    debug!("UDP receive loop stopped");
}

/// UDP transport over a tokio socket.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    local_addr: Option<SocketAddr>,
    shutdown: Arc<Notify>,
    closed: AtomicBool,
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, to: SocketAddr, payload: Bytes) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        match self.socket.send_to(&payload, to).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                Err(TransportError::Unreachable(to))
            }
            Err(e) => Err(TransportError::io("send", &e)),
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            // Stored permit wakes the loop even if it is mid-receive
            self.shutdown.notify_one();
        }
    }
}
