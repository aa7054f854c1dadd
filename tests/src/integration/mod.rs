//! Cross-crate flows.

pub mod dns_udp;
pub mod ping_loopback;
pub mod snmp_udp;
pub mod telemetry;
pub mod timing;
