//! # Telemetry Constants
//!
//! Default network layout for a Holojam space. Every value here can be
//! overridden through the node configuration file; these are the values a
//! node uses when the file is silent.

use std::net::Ipv4Addr;

// =============================================================================
// NETWORK LAYOUT
// =============================================================================

/// Port carrying motion-capture poses from the tracker.
pub const MOTIVE_PORT: u16 = 1611;

/// Port carrying non-motion-capture telemetry (phones, controllers, props).
pub const NONMOTIVE_PORT: u16 = 1612;

/// Port the collector listens on for locally-owned objects.
pub const COLLECTOR_PORT: u16 = 1615;

/// Multicast group every receive channel joins.
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(224, 1, 1, 1);

/// Default collector host.
pub const COLLECTOR_HOST: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 44);

// =============================================================================
// TIMING
// =============================================================================

/// Time without any datagram before looked-up objects are marked untracked.
pub const STALENESS_TIMEOUT_MS: u64 = 400;

/// Cadence of the send worker.
pub const SEND_INTERVAL_MS: u64 = 10;

/// Receive socket read timeout; bounds how long `stop()` can take.
pub const POLL_INTERVAL_MS: u64 = 50;

/// Length of one packet-rate diagnostics window.
pub const DIAGNOSTICS_INTERVAL_MS: u64 = 1000;

/// Consumer tick rate (fixed update, Hz).
pub const TICK_RATE: u32 = 50;

// =============================================================================
// LIMITS
// =============================================================================

/// Capacity of every frame buffer; larger envelopes are rejected at encode time.
pub const BUFFER_CAPACITY: usize = 8192;

/// Receive channels delivering this many packets per window or fewer are reported.
pub const RECEIVE_LOW_WATER: u32 = 48;
