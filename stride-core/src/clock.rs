//! Time Sources
//!
//! Every time-dependent rule (OTP expiry, rate-limit windows, daily
//! records) reads time through [`Clock`] so tests can drive it.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use std::sync::{Arc, RwLock};

use crate::constants::DEFAULT_LOCAL_OFFSET_SECS;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    /// Move the clock to an absolute instant
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = match self.now.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = instant;
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut guard = match self.now.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// User-local calendar used for daily records and daily ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalCalendar {
    offset: FixedOffset,
}

impl LocalCalendar {
    /// Calendar at a fixed offset east of UTC. Out-of-range offsets fall back to UTC.
    pub fn new(offset_secs: i32) -> Self {
        let offset = FixedOffset::east_opt(offset_secs).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(0)
    }

    pub fn offset_secs(&self) -> i32 {
        self.offset.local_minus_utc()
    }

    /// Local calendar day of an instant
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// First instant of the next local day
    pub fn next_midnight(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let today = self.date_of(instant);
        let tomorrow = today.succ_opt().unwrap_or(today);
        match tomorrow
            .and_hms_opt(0, 0, 0)
            .and_then(|naive| self.offset.from_local_datetime(&naive).single())
        {
            Some(local) => local.with_timezone(&Utc),
            None => instant + Duration::days(1),
        }
    }
}

impl Default for LocalCalendar {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_OFFSET_SECS)
    }
}
