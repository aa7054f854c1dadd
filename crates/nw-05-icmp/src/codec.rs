//! [`CorrelationCodec`] for ICMP echo.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use nw_03_correlation::{CorrelationCodec, CorrelationId, Decoded, IdSpace};
use shared_types::{ProtocolError, ICMP_PROTOCOL};
use tracing::trace;

use crate::clock::MonotonicClock;
use crate::packet::{strip_ipv4_header, EchoPacket, ECHO_REPLY};

/// A matched echo reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoReply {
    pub from: IpAddr,
    pub identifier: u16,
    pub sequence: u16,
    /// Round-trip time in seconds.
    pub rtt: f64,
}

impl EchoReply {
    pub fn rtt_duration(&self) -> Duration {
        Duration::from_nanos((self.rtt.max(0.0) * 1e9).round() as u64)
    }
}

/// Echo requests to an `IpAddr`, stamped from a [`MonotonicClock`].
///
/// By default the correlation id spans identifier and sequence. A pinned
/// codec keeps one identifier and correlates on the sequence alone.
pub struct IcmpEchoCodec {
    protocol: u8,
    pinned: Option<u16>,
    clock: Arc<dyn MonotonicClock>,
}

impl IcmpEchoCodec {
    pub fn new(clock: Arc<dyn MonotonicClock>) -> Self {
        Self::with_protocol(ICMP_PROTOCOL, clock)
    }

    /// `protocol` is the IPv4 protocol number expected in raw replies.
    pub fn with_protocol(protocol: u8, clock: Arc<dyn MonotonicClock>) -> Self {
        Self {
            protocol,
            pinned: None,
            clock,
        }
    }

    /// Send every echo with `identifier`, as ping sockets require.
    pub fn pinned(mut self, identifier: u16) -> Self {
        self.pinned = Some(identifier);
        self
    }

    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    pub fn pinned_identifier(&self) -> Option<u16> {
        self.pinned
    }
}

impl fmt::Debug for IcmpEchoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IcmpEchoCodec")
            .field("protocol", &self.protocol)
            .field("pinned", &self.pinned)
            .finish()
    }
}

impl CorrelationCodec for IcmpEchoCodec {
    type Request = IpAddr;
    type Response = EchoReply;

    fn id_space(&self) -> IdSpace {
        match self.pinned {
            Some(_) => IdSpace::bits(16),
            None => IdSpace::ICMP,
        }
    }

    fn encode(&self, id: CorrelationId, target: &IpAddr) -> Result<Bytes, ProtocolError> {
        if target.is_ipv6() {
            return Err(ProtocolError::Malformed(format!(
                "ICMPv6 echo is not supported ({})",
                target
            )));
        }
        let (identifier, sequence) = match self.pinned {
            Some(identifier) => (identifier, id.as_u16()),
            None => {
                let id = id.as_u32();
                ((id >> 16) as u16, id as u16)
            }
        };
        let packet = EchoPacket::request(identifier, sequence, self.clock.now_nanos());
        Ok(packet.encode())
    }

    fn decode(
        &self,
        from: SocketAddr,
        payload: &[u8],
    ) -> Result<Decoded<EchoReply>, ProtocolError> {
        let arrival = self.clock.now_nanos();
        let icmp = strip_ipv4_header(payload, self.protocol)?;
        let packet = EchoPacket::parse(icmp)?;
        if packet.kind != ECHO_REPLY {
            trace!(from = %from, kind = packet.kind, "Ignoring non-reply ICMP message");
            return Err(ProtocolError::UnexpectedType {
                expected: ECHO_REPLY,
                actual: packet.kind,
            });
        }

        let id = match self.pinned {
            Some(identifier) if packet.identifier != identifier => {
                return Err(ProtocolError::Malformed(format!(
                    "echo identifier {:#06x} belongs to another pinger",
                    packet.identifier
                )));
            }
            Some(_) => CorrelationId::from(packet.sequence),
            None => CorrelationId::from(packet.correlation_id()),
        };

        let elapsed = arrival.saturating_sub(packet.timestamp_ns);
        Ok(Decoded::ok(
            id,
            EchoReply {
                from: from.ip(),
                identifier: packet.identifier,
                sequence: packet.sequence,
                rtt: elapsed as f64 / 1e9,
            },
        ))
    }

    fn destination(&self, target: &IpAddr) -> Option<SocketAddr> {
        Some(SocketAddr::new(*target, 0))
    }
}
