//! System clock adapter.
//!
//! Implements [`ClockPort`] with the host's local time zone.  Regulation
//! decisions use the local time of day; records are stamped in UTC.

use chrono::{DateTime, Local, NaiveTime, Utc};

use crate::app::ports::ClockPort;

/// Wall clock of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl ClockPort for SystemClock {
    fn local_time(&self) -> NaiveTime {
        Local::now().time()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
