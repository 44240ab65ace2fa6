//! Release calendar arithmetic.
//!
//! The origin publishes a new database once a month, on a fixed weekday of
//! the first week. The next check is aimed at the first such weekday on or
//! after the first day of the following month, keeping the time of day of
//! the clock reading.

use std::time::Duration;

use chrono::{DateTime, Datelike, Days, Months, NaiveDateTime, TimeDelta, Utc, Weekday};

/// Source of the current time, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Monthly release cadence anchored on a weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseSchedule {
    weekday: Weekday,
}

impl Default for ReleaseSchedule {
    fn default() -> Self {
        Self { weekday: Weekday::Wed }
    }
}

impl ReleaseSchedule {
    pub fn new(weekday: Weekday) -> Self {
        Self { weekday }
    }

    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    /// Next checkpoint after `now`, or `None` when the calendar runs out.
    pub fn next_checkpoint(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let first_of_next = now
            .date_naive()
            .with_day(1)?
            .checked_add_months(Months::new(1))?;

        let offset = (7 + self.weekday.num_days_from_monday() - first_of_next.weekday().num_days_from_monday()) % 7;
        let date = first_of_next.checked_add_days(Days::new(u64::from(offset)))?;

        Some(NaiveDateTime::new(date, now.time()).and_utc())
    }

    /// Time to wait from `now` until the next checkpoint.
    ///
    /// Never fails: an unrepresentable checkpoint or delay yields
    /// `Duration::ZERO`, which triggers the next check immediately.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Duration {
        match self.next_checkpoint(now) {
            Some(checkpoint) => bounded_delay(checkpoint.signed_duration_since(now)),
            None => {
                tracing::warn!(%now, "next checkpoint is out of calendar range, checking immediately");
                Duration::ZERO
            }
        }
    }
}

/// Converts a signed delta to a timer duration.
///
/// Deltas that do not fit in `i64` nanoseconds, and negative deltas,
/// collapse to zero.
pub fn bounded_delay(delta: TimeDelta) -> Duration {
    if delta.num_nanoseconds().is_none() {
        tracing::warn!(seconds = delta.num_seconds(), "delay out of range, checking immediately");
        return Duration::ZERO;
    }
    delta.to_std().unwrap_or(Duration::ZERO)
}
