//! # Transport adapters
//!
//! - [`udp`]: tokio `UdpSocket` with a receive task.
//! - [`loopback`]: in-process peer driven by a reply function, for tests and
//!   simulations.

pub mod loopback;
pub mod udp;

pub use loopback::{LoopbackBuilder, LoopbackReply, LoopbackStats};
pub use udp::{UdpTransport, UdpTransportBuilder};
