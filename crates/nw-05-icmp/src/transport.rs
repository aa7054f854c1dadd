//! OS ICMP sockets for [`PingClient::connect_raw`](crate::PingClient::connect_raw).
//!
//! Two IPv4 socket kinds are supported:
//!
//! - [`IcmpSocketKind::Raw`]: `SOCK_RAW` / `IPPROTO_ICMP`. Needs root or
//!   `CAP_NET_RAW`. Replies arrive with their IPv4 header, and every ICMP
//!   message reaching the host is delivered; foreign echoes end up as
//!   unknown ids.
//! - [`IcmpSocketKind::Dgram`]: Linux ping sockets. Unprivileged when the
//!   process group is inside `net.ipv4.ping_group_range`. The kernel writes
//!   the socket's bound port into the echo identifier, so the socket is
//!   bound to the connection's identifier.
//!
//! The socket is driven through tokio's [`AsyncFd`].

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use nw_03_correlation::{Datagram, EventSink, Transport, TransportBuilder, TransportEvent};
use shared_types::{IcmpSocketKind, TransportError};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::io::unix::AsyncFd;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

/// Largest IPv4 datagram.
const MAX_PACKET: usize = 65_535;

/// Opens one ICMP socket per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpSocketBuilder {
    kind: IcmpSocketKind,
    identifier: u16,
}

impl IcmpSocketBuilder {
    /// `identifier` is the echo identifier the connection sends with; ping
    /// sockets bind to it.
    pub fn new(kind: IcmpSocketKind, identifier: u16) -> Self {
        Self { kind, identifier }
    }

    pub fn kind(&self) -> IcmpSocketKind {
        self.kind
    }

    fn open(&self) -> io::Result<UdpSocket> {
        let ty = match self.kind {
            IcmpSocketKind::Raw => Type::RAW,
            IcmpSocketKind::Dgram => Type::DGRAM,
        };
        let socket = Socket::new(Domain::IPV4, ty, Some(Protocol::ICMPV4))?;
        if self.kind == IcmpSocketKind::Dgram {
            let local = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.identifier);
            socket.bind(&SockAddr::from(local))?;
        }
        socket.set_nonblocking(true)?;
        // sendto/recvfrom on an ICMP socket behave like UDP's
        Ok(socket.into())
    }
}

#[async_trait]
impl TransportBuilder for IcmpSocketBuilder {
    async fn connect(&self, events: EventSink) -> Result<Arc<dyn Transport>, TransportError> {
        let socket = self.open().map_err(|e| {
            if e.kind() == io::ErrorKind::PermissionDenied {
                warn!(
                    kind = ?self.kind,
                    "ICMP socket refused; raw sockets need CAP_NET_RAW, ping sockets \
                     need net.ipv4.ping_group_range"
                );
            }
            TransportError::io("open icmp socket", &e)
        })?;
        let local_addr = socket.local_addr().ok();
        let socket = AsyncFd::new(socket).map_err(|e| TransportError::io("register", &e))?;
        let socket = Arc::new(socket);
        let shutdown = Arc::new(Notify::new());

        tokio::spawn(receive_loop(
            Arc::clone(&socket),
            events,
            Arc::clone(&shutdown),
        ));

        debug!(kind = ?self.kind, identifier = self.identifier, "ICMP socket open");
        Ok(Arc::new(IcmpTransport {
            socket,
            local_addr,
            shutdown,
            closed: AtomicBool::new(false),
        }))
    }
}

async fn recv_from(
    socket: &AsyncFd<UdpSocket>,
    buffer: &mut [u8],
) -> io::Result<(usize, SocketAddr)> {
    loop {
        let mut guard = socket.readable().await?;
        match guard.try_io(|inner| inner.get_ref().recv_from(buffer)) {
            Ok(result) => return result,
            Err(_would_block) => continue,
        }
    }
}

async fn receive_loop(socket: Arc<AsyncFd<UdpSocket>>, events: EventSink, shutdown: Arc<Notify>) {
    let mut buffer = vec![0u8; MAX_PACKET];
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            received = recv_from(&socket, &mut buffer) => {
                let event = match received {
                    Ok((len, from)) => {
                        trace!(from = %from, bytes = len, "ICMP packet received");
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
    debug!("ICMP receive loop stopped");
}

/// ICMP transport over a non-blocking socket.
pub struct IcmpTransport {
    socket: Arc<AsyncFd<UdpSocket>>,
    local_addr: Option<SocketAddr>,
    shutdown: Arc<Notify>,
    closed: AtomicBool,
}

#[async_trait]
impl Transport for IcmpTransport {
    async fn send(&self, to: SocketAddr, payload: Bytes) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let sent = loop {
            let mut guard = self
                .socket
                .writable()
                .await
                .map_err(|e| TransportError::io("send", &e))?;
            match guard.try_io(|inner| inner.get_ref().send_to(&payload, to)) {
                Ok(result) => break result,
                Err(_would_block) => continue,
            }
        };
        match sent {
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
            self.shutdown.notify_one();
        }
    }
}
