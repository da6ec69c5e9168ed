//! # Rate Diagnostics
//!
//! Every worker counts the datagrams it accepted or sent. Once per window the
//! orchestrator takes all counts (resetting them) and warns about channels
//! at or below their low-water mark.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Identifies one channel of an orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChannelId {
    /// The outbound channel.
    Send,
    /// An inbound channel, by configuration index.
    Receive(usize),
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => write!(f, "send"),
            Self::Receive(index) => write!(f, "receive[{index}]"),
        }
    }
}

/// Packet counts for one diagnostics window.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RateReport {
    /// Datagrams per channel during the window.
    pub counts: BTreeMap<ChannelId, u32>,
    /// Channels at or below their threshold, in channel order.
    pub under_delivering: Vec<ChannelId>,
}

impl RateReport {
    /// Count for one channel; zero if the channel is unknown.
    #[must_use]
    pub fn count(&self, channel: ChannelId) -> u32 {
        self.counts.get(&channel).copied().unwrap_or(0)
    }

    /// Sum over all receive channels.
    #[must_use]
    pub fn received(&self) -> u64 {
        self.counts
            .iter()
            .filter(|(id, _)| matches!(id, ChannelId::Receive(_)))
            .map(|(_, &n)| u64::from(n))
            .sum()
    }
}

/// Decides when a diagnostics window has elapsed.
#[derive(Debug)]
pub(crate) struct RateWindow {
    interval: Duration,
    started: Option<Instant>,
}

impl RateWindow {
    pub(crate) const fn new(interval: Duration) -> Self {
        Self { interval, started: None }
    }

    /// The first call opens a window; later calls return true once the
    /// window is over and open the next one.
    pub(crate) fn elapsed(&mut self, now: Instant) -> bool {
        match self.started {
            None => {
                self.started = Some(now);
                false
            }
            Some(started) if now.saturating_duration_since(started) >= self.interval => {
                self.started = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}
