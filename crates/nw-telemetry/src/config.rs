//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive such as `nw_03_correlation=trace,info`
    pub log_level: String,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "netwatch".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `NW_SERVICE_NAME`: Service name (default: netwatch)
    /// - `NW_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `NW_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("NW_SERVICE_NAME").unwrap_or_else(|_| "netwatch".to_string()),

            log_level: env::var("NW_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("NW_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Configuration for a named client with an explicit level.
    pub fn for_client(name: &str, log_level: &str) -> Self {
        Self {
            service_name: format!("netwatch-{}", name),
            log_level: log_level.to_string(),
            json_logs: false,
        }
    }
}
