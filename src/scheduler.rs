//! Time-of-day windows and subroutine cadences.
//!
//! Every started subroutine is driven by a [`Cadence`]: either a fixed
//! period (Sensors, Climate, Light, Pictures) or a daily wall-clock time
//! (Health).  [`TimeWindow`] answers "is it day?" and "is the light due?"
//! with half-open, midnight-wrapping semantics.
//!
//! ```text
//!   start <= end :   ──────[start ████████ end)──────
//!   start >  end :   ████ end)──────────────[start ████
//! ```

use std::time::Duration;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

const SECS_PER_DAY: u32 = 24 * 3600;

// ═══════════════════════════════════════════════════════════════
//  Time window
// ═══════════════════════════════════════════════════════════════

/// Half-open time-of-day interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub const fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Check whether `now` falls inside the window.  `start == end` is empty.
    pub fn contains(&self, now: NaiveTime) -> bool {
        if self.start <= self.end {
            // e.g. 08:00..20:00
            now >= self.start && now < self.end
        } else {
            // e.g. 22:00..06:00, wraps around midnight
            now >= self.start || now < self.end
        }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }
}

// ═══════════════════════════════════════════════════════════════
//  Cadence
// ═══════════════════════════════════════════════════════════════

/// When a subroutine's `routine()` fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Fire immediately, then every period.
    Every(Duration),
    /// Fire once per day at the given local time.
    DailyAt(NaiveTime),
}

impl Cadence {
    /// Delay from `now` until the next fire, for daily cadences.
    /// Periodic cadences return their period.
    pub fn next_delay(&self, now: NaiveTime) -> Duration {
        match *self {
            Self::Every(period) => period,
            Self::DailyAt(at) => delay_until(at, now),
        }
    }
}

/// Time from `now` to the next occurrence of `at`.  An exact hit waits a full day.
pub fn delay_until(at: NaiveTime, now: NaiveTime) -> Duration {
    let at_s = at.num_seconds_from_midnight();
    let now_s = now.num_seconds_from_midnight();
    let secs = (at_s + SECS_PER_DAY - now_s) % SECS_PER_DAY;
    if secs == 0 {
        Duration::from_secs(u64::from(SECS_PER_DAY))
    } else {
        Duration::from_secs(u64::from(secs))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
