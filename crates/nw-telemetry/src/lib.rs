//! # Netwatch Telemetry
//!
//! Structured logging for the Netwatch clients.
//!
//! Library crates only emit `tracing` events. Binaries and test suites call
//! [`init_logging`] once to install a subscriber.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nw_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_logging(&config).expect("Failed to init logging");
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NW_SERVICE_NAME` | `netwatch` | Service name attached to startup log |
//! | `NW_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `NW_JSON_LOGS` | `false` | Emit JSON lines instead of text |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{init_logging, init_test_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}
