//! # ICMP Echo
//!
//! Ping over the correlation core.
//!
//! The 32-bit correlation id is split across the echo header: the high half
//! is the ICMP identifier, the low half the sequence number. Each request
//! carries its send instant as 8 big-endian nanoseconds from a
//! [`MonotonicClock`], so the round-trip time is read straight off the reply.
//!
//! ## Echo layout
//!
//! ```text
//!  0       1       2               4               6               8
//! +-------+-------+---------------+---------------+---------------+
//! | type  | code  |   checksum    |  identifier   |   sequence    |
//! +-------+-------+---------------+---------------+---------------+
//! |              origin timestamp (u64 nanoseconds, BE)           |
//! +---------------------------------------------------------------+
//! ```
//!
//! Raw IPv4 sockets deliver replies with the IP header in front; the codec
//! strips it when the protocol field matches the configured ICMP protocol.
//! [`PingClient::connect_raw`] opens such a socket (or a Linux ping socket)
//! through [`IcmpSocketBuilder`]; any other [`TransportBuilder`] works with
//! [`PingClient::connect`].
//!
//! [`TransportBuilder`]: nw_03_correlation::TransportBuilder

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod checksum;
pub mod client;
pub mod clock;
pub mod codec;
pub mod packet;
#[cfg(unix)]
pub mod transport;

pub use checksum::internet_checksum;
pub use client::PingClient;
pub use clock::{ManualClock, MonotonicClock, SystemMonotonicClock};
pub use codec::{EchoReply, IcmpEchoCodec};
pub use packet::EchoPacket;
#[cfg(unix)]
pub use transport::{IcmpSocketBuilder, IcmpTransport};
