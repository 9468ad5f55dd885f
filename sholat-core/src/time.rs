//! Time and duration helpers.
//!
//! All wall-clock values in this crate are local `NaiveDateTime`s; the device
//! clock is the only time source and no time zone conversion happens.

use chrono::{Duration as ChronoDuration, NaiveDateTime, NaiveTime, Timelike};
use std::time::Duration;

/// Format of the `startedAt` field of the persisted announcement record.
pub const STARTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Extension trait for safe Duration conversions.
pub trait DurationExt {
    /// Convert duration to milliseconds as u64, saturating at `u64::MAX`.
    fn as_millis_u64(&self) -> u64;
}

impl DurationExt for Duration {
    fn as_millis_u64(&self) -> u64 {
        u64::try_from(self.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Drop seconds and sub-second precision.
#[must_use]
pub fn truncate_to_minute(at: NaiveDateTime) -> NaiveDateTime {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

/// Drop sub-second precision.
#[must_use]
pub fn truncate_to_second(at: NaiveDateTime) -> NaiveDateTime {
    at.with_nanosecond(0).unwrap_or(at)
}

/// The first instant of the day after `at`.
#[must_use]
pub fn next_midnight(at: NaiveDateTime) -> NaiveDateTime {
    (at.date() + ChronoDuration::days(1)).and_time(NaiveTime::MIN)
}

/// Non-negative elapsed time from `earlier` to `later`, or `None` if `later`
/// is before `earlier`.
#[must_use]
pub fn elapsed_between(earlier: NaiveDateTime, later: NaiveDateTime) -> Option<Duration> {
    (later - earlier).to_std().ok()
}
