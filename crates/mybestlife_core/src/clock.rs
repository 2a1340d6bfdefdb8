//! Wall-clock abstraction used by CP tracking and auth flows.
//!
//! # Responsibility
//! - Provide "today" and "now" to core logic through an injected trait.
//! - Keep ISO calendar-date formatting in one place.
//!
//! # Invariants
//! - "today" is the UTC calendar date, matching the `YYYY-MM-DD` markers
//!   persisted by existing clients.
//! - `FixedClock` never moves unless explicitly set or advanced.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of current time for core services.
pub trait Clock: Send + Sync {
    /// Current UTC instant.
    fn now(&self) -> DateTime<Utc>;

    /// Current UTC calendar date.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Current time as Unix epoch milliseconds.
    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for simulations and tests.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn at_millis(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// Creates a clock positioned at `time` on `date` (UTC).
    pub fn on_date_at(date: NaiveDate, time: NaiveTime) -> Self {
        Self::at_millis(date.and_time(time).and_utc().timestamp_millis())
    }

    /// Creates a clock positioned at midday of `date` (UTC).
    pub fn on_date(date: NaiveDate) -> Self {
        Self::on_date_at(date, midday())
    }

    /// Moves the clock to midday of `date`.
    pub fn set_date(&self, date: NaiveDate) {
        self.set_millis(date.and_time(midday()).and_utc().timestamp_millis());
    }

    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// Formats a calendar date as `YYYY-MM-DD`.
pub fn format_iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses a `YYYY-MM-DD` date, tolerating surrounding whitespace.
///
/// Also accepts full ISO timestamps and keeps only their date part, since
/// older clients persisted `toISOString()` values in a few places.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn midday() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN)
}
