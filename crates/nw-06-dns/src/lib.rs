//! # DNS
//!
//! A/AAAA queries over the correlation core. The 16-bit transaction id in
//! the first two bytes of the header is the correlation id.
//!
//! Only the pieces needed to resolve an address are understood: the header,
//! one question, and A/AAAA answer records. Everything else in a response is
//! kept as raw bytes.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod codec;
pub mod message;

#[cfg(test)]
mod testing;

pub use client::DnsClient;
pub use codec::DnsCodec;
pub use message::{DnsQuery, DnsResponse, RecordType};
