//! # Shared Types Crate
//!
//! Types every Netwatch crate agrees on.
//!
//! - [`errors`]: the request outcome taxonomy. Every issued request resolves
//!   to exactly one `Result<Response, RequestError>`.
//! - [`config`]: [`CoreConfig`], the explicit configuration value handed to
//!   connections and clients. There is no global configuration.

pub mod config;
pub mod errors;

pub use config::{
    CoreConfig, DnsConfig, IcmpConfig, IcmpSocketKind, SnmpConfig, TimeoutConfig, ICMP_PROTOCOL,
    MAX_PRECISION, MAX_TIMEOUT,
};
pub use errors::*;
