//! # Consumer Tick Pacing
//!
//! Fixed-timestep loop for the thread that calls `reconcile`. Workers never
//! use it; they pace themselves on their sockets.
//!
//! ```text
//!  should_tick ─▶ begin_tick ─▶ reconcile(views, tick.delta) ─▶ end_tick
//!       ▲                                                          │
//!       └────────────────────── wait_for_next_tick ◀───────────────┘
//! ```
//!
//! `Tick::delta` is the wall time since the previous tick began, which is the
//! value the staleness timers expect.

use std::time::{Duration, Instant};

use holojam_shared::constants::TICK_RATE;

/// Handle for one running tick.
#[derive(Clone, Copy, Debug)]
pub struct Tick {
    /// Sequence number, starting at 1.
    pub index: u64,
    /// When the tick began.
    pub started: Instant,
    /// Time since the previous tick began.
    pub delta: Duration,
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickStats {
    /// Shortest tick body observed.
    pub min_tick_us: u64,
    /// Longest tick body observed.
    pub max_tick_us: u64,
    /// Rolling average of the tick body.
    pub avg_tick_us: u64,
    /// Ticks whose body overran the budget.
    pub late_ticks: u64,
    /// Ticks measured.
    pub total_ticks: u64,
}

impl TickStats {
    fn fresh(budget: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: duration_us(budget),
            late_ticks: 0,
            total_ticks: 0,
        }
    }
}

/// Fixed-timestep controller.
#[derive(Debug)]
pub struct TickLoop {
    tick_duration: Duration,
    last_poll: Instant,
    last_begin: Option<Instant>,
    accumulator: Duration,
    tick_count: u64,
    stats: TickStats,
}

impl TickLoop {
    /// Creates a loop running `tick_rate` times per second. A rate of zero
    /// is treated as one.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let tick_duration = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));
        Self {
            tick_duration,
            last_poll: Instant::now(),
            last_begin: None,
            accumulator: Duration::ZERO,
            tick_count: 0,
            stats: TickStats::fresh(tick_duration),
        }
    }

    /// Returns true while a tick is due. Call until it returns false.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = Instant::now();
        self.accumulator += now.duration_since(self.last_poll);
        self.last_poll = now;
        self.accumulator >= self.tick_duration
    }

    /// Starts a tick and consumes one step from the accumulator.
    pub fn begin_tick(&mut self) -> Tick {
        self.accumulator = self.accumulator.saturating_sub(self.tick_duration);
        self.tick_count += 1;

        let started = Instant::now();
        let delta = self
            .last_begin
            .map_or(self.tick_duration, |previous| started.duration_since(previous));
        self.last_begin = Some(started);

        Tick {
            index: self.tick_count,
            started,
            delta,
        }
    }

    /// Records how long the tick body took.
    pub fn end_tick(&mut self, tick: Tick) {
        let body = tick.started.elapsed();
        let body_us = duration_us(body);

        self.stats.total_ticks += 1;
        self.stats.min_tick_us = self.stats.min_tick_us.min(body_us);
        self.stats.max_tick_us = self.stats.max_tick_us.max(body_us);
        self.stats.avg_tick_us = (self.stats.avg_tick_us * 15 + body_us) / 16;
        if body > self.tick_duration {
            self.stats.late_ticks += 1;
        }
    }

    /// Sleeps until the next tick is due.
    pub fn wait_for_next_tick(&self) {
        let since = self.last_poll.elapsed() + self.accumulator;
        if since < self.tick_duration {
            std::thread::sleep(self.tick_duration - since);
        }
    }

    /// Ticks started so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Timing statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Target tick period.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Clears the statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TickStats::fresh(self.tick_duration);
    }
}

impl Default for TickLoop {
    fn default() -> Self {
        Self::new(TICK_RATE)
    }
}

fn duration_us(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}
