//! # Network Simulation
//!
//! Perturbs a datagram stream the way a busy wireless network does, so the
//! frame ordering on the receive side can be exercised without one.
//!
//! ## Perturbations
//!
//! - Loss: the datagram is never delivered
//! - Duplication: the datagram is delivered twice
//! - Reordering: the datagram is held back and delivered after the next one
//!
//! All decisions come from a seeded generator; the same seed and input give
//! the same output.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Perturbation rates, each in percent (0-100).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkConditions {
    /// Chance a datagram is dropped.
    pub packet_loss_percent: u8,
    /// Chance a delivered datagram is delivered twice.
    pub duplicate_percent: u8,
    /// Chance a datagram swaps places with the next one.
    pub out_of_order_percent: u8,
}

impl NetworkConditions {
    /// Wired LAN.
    pub const PERFECT: Self = Self {
        packet_loss_percent: 0,
        duplicate_percent: 0,
        out_of_order_percent: 0,
    };

    /// A quiet wireless network.
    pub const AVERAGE: Self = Self {
        packet_loss_percent: 1,
        duplicate_percent: 1,
        out_of_order_percent: 2,
    };

    /// A crowded wireless network during a show.
    pub const POOR: Self = Self {
        packet_loss_percent: 5,
        duplicate_percent: 2,
        out_of_order_percent: 5,
    };

    /// Builds conditions, clamping each rate to 100.
    #[must_use]
    pub fn new(loss: u8, duplicate: u8, reorder: u8) -> Self {
        Self {
            packet_loss_percent: loss.min(100),
            duplicate_percent: duplicate.min(100),
            out_of_order_percent: reorder.min(100),
        }
    }

    /// Returns true if no perturbation can happen.
    #[must_use]
    pub const fn is_perfect(&self) -> bool {
        self.packet_loss_percent == 0 && self.duplicate_percent == 0 && self.out_of_order_percent == 0
    }
}

impl Default for NetworkConditions {
    fn default() -> Self {
        Self::PERFECT
    }
}

/// Counters kept by a [`LossyLink`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Datagrams handed to the link.
    pub offered: u64,
    /// Datagrams handed out, duplicates included.
    pub delivered: u64,
    /// Datagrams dropped.
    pub dropped: u64,
    /// Extra copies delivered.
    pub duplicated: u64,
    /// Datagrams held back behind their successor.
    pub reordered: u64,
}

/// A deterministic lossy link.
#[derive(Debug)]
pub struct LossyLink {
    conditions: NetworkConditions,
    rng: ChaCha8Rng,
    held: Option<Vec<u8>>,
    stats: LinkStats,
}

impl LossyLink {
    /// Creates a link with the given conditions and seed.
    #[must_use]
    pub fn new(conditions: NetworkConditions, seed: u64) -> Self {
        Self {
            conditions,
            rng: ChaCha8Rng::seed_from_u64(seed),
            held: None,
            stats: LinkStats::default(),
        }
    }

    /// Conditions in effect.
    #[must_use]
    pub const fn conditions(&self) -> NetworkConditions {
        self.conditions
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Offers one datagram; returns what comes out the other end right now,
    /// in delivery order.
    pub fn transmit(&mut self, datagram: Vec<u8>) -> Vec<Vec<u8>> {
        self.stats.offered += 1;
        let mut out = Vec::with_capacity(3);

        if self.roll(self.conditions.packet_loss_percent) {
            self.stats.dropped += 1;
        } else if self.held.is_none() && self.roll(self.conditions.out_of_order_percent) {
            self.stats.reordered += 1;
            self.held = Some(datagram);
            return out;
        } else {
            if self.roll(self.conditions.duplicate_percent) {
                self.stats.duplicated += 1;
                out.push(datagram.clone());
            }
            out.push(datagram);
        }

        if let Some(held) = self.held.take() {
            out.push(held);
        }
        self.stats.delivered += out.len() as u64;
        out
    }

    /// Releases a held-back datagram, if any.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        let held = self.held.take();
        if held.is_some() {
            self.stats.delivered += 1;
        }
        held
    }

    fn roll(&mut self, percent: u8) -> bool {
        percent > 0 && self.rng.gen_range(0u8..100) < percent
    }
}
