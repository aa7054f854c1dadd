//! Core configuration with validation.
//!
//! Every section uses `#[serde(default)]`, so a TOML file only needs the
//! values it overrides:
//!
//! ```toml
//! [timeout]
//! precision = "50ms"
//! default = "2s"
//!
//! [dns]
//! server = "10.0.0.53"
//!
//! [snmp]
//! community = "monitoring"
//! bulk_size = 25
//! ```

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// IANA protocol number for ICMP.
pub const ICMP_PROTOCOL: u8 = 1;

/// Longest accepted `timeout.default` (one day).
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Coarsest accepted `timeout.precision`.
pub const MAX_PRECISION: Duration = Duration::from_secs(60);

/// Top-level configuration handed to connections and clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CoreConfig {
    /// Timeout scheduler settings
    pub timeout: TimeoutConfig,
    /// DNS client settings
    pub dns: DnsConfig,
    /// SNMP client settings
    pub snmp: SnmpConfig,
    /// ICMP echo settings
    pub icmp: IcmpConfig,
}

impl CoreConfig {
    /// Parse configuration from a TOML string and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.precision.is_zero() {
            return Err(ConfigError::Invalid(
                "timeout.precision cannot be 0".into(),
            ));
        }

        if self.timeout.precision > MAX_PRECISION {
            return Err(ConfigError::Invalid(format!(
                "timeout.precision above {:?}: {:?}",
                MAX_PRECISION, self.timeout.precision
            )));
        }

        if self.timeout.default.is_zero() {
            return Err(ConfigError::Invalid("timeout.default cannot be 0".into()));
        }

        if self.timeout.default > MAX_TIMEOUT {
            return Err(ConfigError::Invalid(format!(
                "timeout.default above {:?}: {:?}",
                MAX_TIMEOUT, self.timeout.default
            )));
        }

        if self.dns.port == 0 {
            return Err(ConfigError::Invalid("dns.port cannot be 0".into()));
        }

        if self.snmp.port == 0 {
            return Err(ConfigError::Invalid("snmp.port cannot be 0".into()));
        }

        // max-repetitions travels as a signed 32-bit INTEGER
        if self.snmp.bulk_size == 0 || self.snmp.bulk_size > i32::MAX as u32 {
            return Err(ConfigError::Invalid(format!(
                "snmp.bulk_size out of range: {}",
                self.snmp.bulk_size
            )));
        }

        if self.snmp.community.is_empty() {
            return Err(ConfigError::Invalid(
                "snmp.community cannot be empty".into(),
            ));
        }

        Ok(())
    }

    /// Address of the configured DNS server.
    pub fn dns_server(&self) -> SocketAddr {
        SocketAddr::new(self.dns.server, self.dns.port)
    }
}

/// Timeout scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Slack added to every wake so timers coalesce
    #[serde(with = "humantime_serde")]
    pub precision: Duration,
    /// Per-request deadline used by the protocol clients
    #[serde(with = "humantime_serde")]
    pub default: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            precision: Duration::from_millis(100),
            default: Duration::from_secs(5),
        }
    }
}

/// DNS client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    pub server: IpAddr,
    pub port: u16,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            server: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 53,
        }
    }
}

/// SNMP client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnmpConfig {
    pub port: u16,
    pub community: String,
    /// max-repetitions for GETBULK
    pub bulk_size: u32,
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            port: 161,
            community: "public".to_string(),
            bulk_size: 10,
        }
    }
}

/// ICMP echo settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcmpConfig {
    /// Protocol number expected in the IPv4 header of raw replies
    pub protocol: u8,
    /// Echo identifier for the first request; derived from the process id when unset
    pub identifier_seed: Option<u16>,
    /// OS socket used by `PingClient::connect_raw`
    pub socket: IcmpSocketKind,
}

/// Kind of ICMP socket opened for real pings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IcmpSocketKind {
    /// `SOCK_RAW`; needs root or `CAP_NET_RAW`.
    #[default]
    Raw,
    /// Linux ping socket; needs the group in `net.ipv4.ping_group_range`.
    Dgram,
}

impl Default for IcmpConfig {
    fn default() -> Self {
        Self {
            protocol: ICMP_PROTOCOL,
            identifier_seed: None,
            socket: IcmpSocketKind::Raw,
        }
    }
}

impl IcmpConfig {
    /// Identifier used for the first echo request.
    pub fn identifier(&self) -> u16 {
        self.identifier_seed
            .unwrap_or_else(|| (std::process::id() & 0xFFFF) as u16)
    }
}

/// Durations as human readable strings ("250ms", "5s", "1m").
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" must be checked before the bare 's' and 'm' suffixes
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map_err(|_| "invalid minutes")?
                .checked_mul(60)
                .map(Duration::from_secs)
                .ok_or("minutes out of range")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
