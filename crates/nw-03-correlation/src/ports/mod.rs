//! # Ports
//!
//! - [`outbound`]: what a connection needs from the network (a datagram
//!   transport).
//! - [`codec`]: what a connection needs from a protocol (how the
//!   correlation id travels inside its messages).

pub mod codec;
pub mod outbound;

pub use codec::{CorrelationCodec, Decoded};
pub use outbound::{Datagram, EventSink, Transport, TransportBuilder, TransportEvent};
