//! # Node Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file describes the standard two-channel space.
//!
//! ```toml
//! multicast_group = "224.1.1.1"
//! buffer_capacity = 8192
//! staleness_timeout_ms = 400
//!
//! [send]
//! collector = "192.168.1.44:1615"
//!
//! [[receive]]
//! name = "motive"
//! port = 1611
//! ```

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;

use holojam_shared::constants::{
    BUFFER_CAPACITY, COLLECTOR_HOST, COLLECTOR_PORT, DIAGNOSTICS_INTERVAL_MS, MOTIVE_PORT, MULTICAST_GROUP,
    NONMOTIVE_PORT, POLL_INTERVAL_MS, RECEIVE_LOW_WATER, SEND_INTERVAL_MS, STALENESS_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::protocol::ENVELOPE_HEADER_LEN;

/// Transport configuration for one node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Group every receive channel joins.
    pub multicast_group: Ipv4Addr,
    /// Frame buffer capacity in bytes; bounds the datagram size.
    pub buffer_capacity: usize,
    /// Silence after which looked-up objects are marked untracked.
    pub staleness_timeout_ms: u64,
    /// Receive socket read timeout; bounds how long a stop can take.
    pub poll_interval_ms: u64,
    /// Outbound channel.
    pub send: SendConfig,
    /// Packet-rate reporting.
    pub diagnostics: DiagnosticsConfig,
    /// Inbound channels, in lookup priority order.
    pub receive: Vec<ReceiveChannelConfig>,
}

/// Outbound channel configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SendConfig {
    /// Where locally-owned objects are sent.
    pub collector: SocketAddr,
    /// Send cadence.
    pub interval_ms: u64,
    /// Tag written into every outbound envelope.
    pub source: String,
    /// Warn when a window sends this many packets or fewer. `None` disables.
    pub low_water: Option<u32>,
}

/// One inbound channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiveChannelConfig {
    /// Name used in logs.
    pub name: String,
    /// Local UDP port.
    pub port: u16,
    /// Warn when a window receives this many packets or fewer.
    #[serde(default = "default_receive_low_water")]
    pub low_water: u32,
}

/// Diagnostics configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiagnosticsConfig {
    /// Length of one counting window.
    pub interval_ms: u64,
}

const fn default_receive_low_water() -> u32 {
    RECEIVE_LOW_WATER
}

impl ReceiveChannelConfig {
    /// A channel with the default low-water threshold.
    #[must_use]
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
            low_water: RECEIVE_LOW_WATER,
        }
    }
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            collector: SocketAddr::V4(SocketAddrV4::new(COLLECTOR_HOST, COLLECTOR_PORT)),
            interval_ms: SEND_INTERVAL_MS,
            source: "holojam-node".to_owned(),
            low_water: None,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            interval_ms: DIAGNOSTICS_INTERVAL_MS,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            multicast_group: MULTICAST_GROUP,
            buffer_capacity: BUFFER_CAPACITY,
            staleness_timeout_ms: STALENESS_TIMEOUT_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
            send: SendConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            receive: vec![
                ReceiveChannelConfig::new("motive", MOTIVE_PORT),
                ReceiveChannelConfig::new("nonmotive", NONMOTIVE_PORT),
            ],
        }
    }
}

impl TelemetryConfig {
    /// Reads and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that parse but cannot work together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.multicast_group.is_multicast() {
            return Err(ConfigError::Invalid(format!(
                "multicast_group {} is not a multicast address",
                self.multicast_group
            )));
        }
        if self.buffer_capacity < ENVELOPE_HEADER_LEN {
            return Err(ConfigError::Invalid(format!(
                "buffer_capacity {} is smaller than an empty envelope ({ENVELOPE_HEADER_LEN} bytes)",
                self.buffer_capacity
            )));
        }
        for (name, value) in [
            ("staleness_timeout_ms", self.staleness_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("send.interval_ms", self.send.interval_ms),
            ("diagnostics.interval_ms", self.diagnostics.interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }

        let mut ports = HashSet::new();
        let mut names = HashSet::new();
        for channel in &self.receive {
            if channel.port == 0 {
                return Err(ConfigError::Invalid(format!("receive channel {} has port 0", channel.name)));
            }
            if !ports.insert(channel.port) {
                return Err(ConfigError::Invalid(format!("receive port {} used twice", channel.port)));
            }
            if !names.insert(channel.name.as_str()) {
                return Err(ConfigError::Invalid(format!("receive channel name {} used twice", channel.name)));
            }
        }
        Ok(())
    }

    /// Staleness timeout as a duration.
    #[must_use]
    pub const fn staleness_timeout(&self) -> Duration {
        Duration::from_millis(self.staleness_timeout_ms)
    }

    /// Receive read timeout as a duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Send cadence as a duration.
    #[must_use]
    pub const fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send.interval_ms)
    }

    /// Diagnostics window as a duration.
    #[must_use]
    pub const fn diagnostics_interval(&self) -> Duration {
        Duration::from_millis(self.diagnostics.interval_ms)
    }
}
