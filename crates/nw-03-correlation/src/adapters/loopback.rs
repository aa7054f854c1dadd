//! In-process transport: every send is answered by a reply function.
//!
//! Replies are delivered from a spawned task after an optional delay, so
//! they arrive asynchronously like real network traffic. Works under a
//! paused tokio clock.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use shared_types::TransportError;
use tokio::time::sleep;
use tracing::trace;

use crate::ports::{Datagram, EventSink, Transport, TransportBuilder, TransportEvent};

/// What the simulated peer does with one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopbackReply {
    /// Answer once.
    Reply(Bytes),
    /// Answer several times (duplicates, stray packets).
    Replies(Vec<Bytes>),
    /// Answer once after a per-request delay, overriding the builder's.
    Delayed(Bytes, Duration),
    /// Swallow the request.
    Silent,
    /// Fail the send as unreachable.
    Unreachable,
    /// Accept the send, then report a receive failure.
    ReceiveFailure,
    /// Accept the send, then report the transport as closed.
    Hangup,
}

type ReplyFn = dyn Fn(SocketAddr, &[u8]) -> LoopbackReply + Send + Sync;

/// Counters shared between a builder and the transports it opens.
#[derive(Debug, Clone, Default)]
pub struct LoopbackStats {
    sent: Arc<AtomicUsize>,
    replied: Arc<AtomicUsize>,
}

impl LoopbackStats {
    /// Datagrams accepted by `send`.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    /// Replies scheduled for delivery.
    pub fn replied(&self) -> usize {
        self.replied.load(Ordering::SeqCst)
    }
}

/// Opens [`LoopbackTransport`]s sharing one reply function.
#[derive(Clone)]
pub struct LoopbackBuilder {
    reply: Arc<ReplyFn>,
    delay: Duration,
    local_addr: SocketAddr,
    stats: LoopbackStats,
}

impl LoopbackBuilder {
    pub fn new<F>(reply: F) -> Self
    where
        F: Fn(SocketAddr, &[u8]) -> LoopbackReply + Send + Sync + 'static,
    {
        Self {
            reply: Arc::new(reply),
            delay: Duration::ZERO,
            local_addr: SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 40_000),
            stats: LoopbackStats::default(),
        }
    }

    /// Peer that sends every payload straight back.
    pub fn echo() -> Self {
        Self::new(|_, payload| LoopbackReply::Reply(Bytes::copy_from_slice(payload)))
    }

    /// Peer that never answers.
    pub fn silent() -> Self {
        Self::new(|_, _| LoopbackReply::Silent)
    }

    /// Delay before each reply is delivered.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn stats(&self) -> LoopbackStats {
        self.stats.clone()
    }
}

impl fmt::Debug for LoopbackBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackBuilder")
            .field("delay", &self.delay)
            .field("local_addr", &self.local_addr)
            .field("stats", &self.stats)
            .finish()
    }
}

#[async_trait]
impl TransportBuilder for LoopbackBuilder {
    async fn connect(&self, events: EventSink) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(Arc::new(LoopbackTransport {
            reply: Arc::clone(&self.reply),
            delay: self.delay,
            local_addr: self.local_addr,
            stats: self.stats.clone(),
            events,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Transport whose peer is a local function.
pub struct LoopbackTransport {
    reply: Arc<ReplyFn>,
    delay: Duration,
    local_addr: SocketAddr,
    stats: LoopbackStats,
    events: EventSink,
    closed: AtomicBool,
}

impl LoopbackTransport {
    fn deliver(&self, from: SocketAddr, payloads: Vec<Bytes>, delay: Duration) {
        let events = self.events.clone();
        self.stats.replied.fetch_add(payloads.len(), Ordering::SeqCst);
        tokio::spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            for payload in payloads {
                let _ = events.send(TransportEvent::Received(Datagram { from, payload }));
            }
        });
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, to: SocketAddr, payload: Bytes) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.stats.sent.fetch_add(1, Ordering::SeqCst);
        match (self.reply)(to, &payload) {
            LoopbackReply::Reply(reply) => self.deliver(to, vec![reply], self.delay),
            LoopbackReply::Replies(replies) => self.deliver(to, replies, self.delay),
            LoopbackReply::Delayed(reply, delay) => self.deliver(to, vec![reply], delay),
            LoopbackReply::Silent => trace!(to = %to, "Loopback peer stays silent"),
            LoopbackReply::Unreachable => return Err(TransportError::Unreachable(to)),
            LoopbackReply::ReceiveFailure => {
                let error = io::Error::new(io::ErrorKind::Other, "loopback receive failure");
                let _ = self
                    .events
                    .send(TransportEvent::Failed(TransportError::io("recv", &error)));
            }
            LoopbackReply::Hangup => {
                let _ = self.events.send(TransportEvent::Closed);
            }
        }
        Ok(())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local_addr)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
