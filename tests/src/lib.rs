//! # Netwatch Test Suite
//!
//! End-to-end flows across the Netwatch crates.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks (checksum, registry, BER)
//! └── src/
//!     ├── fixtures.rs   # Fake UDP agents bound to 127.0.0.1
//!     └── integration/
//!         ├── dns_udp.rs        # DnsClient against a UDP resolver
//!         ├── snmp_udp.rs       # SnmpClient against a UDP agent
//!         ├── ping_loopback.rs  # PingClient over a lossy loopback network
//!         ├── timing.rs         # Deadlines, resets and close under a paused clock
//!         └── telemetry.rs      # Logging bootstrap
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p nw-tests
//! cargo test -p nw-tests integration::timing::
//! cargo bench -p nw-tests
//! ```

pub mod fixtures;
pub mod integration;
