//! Prayer names, times of day, and the daily schedule.

use crate::error::{CoreError, Result};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

const LOG_TARGET: &str = "sholat::schedule";

/// Format used for prayer times on the wire and on screen.
pub const PRAYER_TIME_FORMAT: &str = "%H:%M";

/// The prayers tracked by the countdown, in the order they occur during a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prayer {
    Subuh,
    Dhuha,
    Dzuhur,
    Ashar,
    Maghrib,
    Isya,
}

impl Prayer {
    /// All prayers in daily order.
    pub const ALL: [Self; 6] = [
        Self::Subuh,
        Self::Dhuha,
        Self::Dzuhur,
        Self::Ashar,
        Self::Maghrib,
        Self::Isya,
    ];

    /// Stable identifier used by the API and the persisted announcement record.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Subuh => "subuh",
            Self::Dhuha => "dhuha",
            Self::Dzuhur => "dzuhur",
            Self::Ashar => "ashar",
            Self::Maghrib => "maghrib",
            Self::Isya => "isya",
        }
    }

    /// Capitalized name for display ("Dzuhur").
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Subuh => "Subuh",
            Self::Dhuha => "Dhuha",
            Self::Dzuhur => "Dzuhur",
            Self::Ashar => "Ashar",
            Self::Maghrib => "Maghrib",
            Self::Isya => "Isya",
        }
    }
}

impl fmt::Display for Prayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Prayer {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownPrayer {
                name: s.to_string(),
            })
    }
}

/// A local time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrayerTime(NaiveTime);

impl PrayerTime {
    /// Build from hour and minute. Returns `None` when out of range.
    #[must_use]
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Parse an `HH:MM` string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrayerTime` if the string is not a valid time of day.
    pub fn parse(value: &str) -> Result<Self> {
        NaiveTime::parse_from_str(value.trim(), PRAYER_TIME_FORMAT)
            .map(Self)
            .map_err(|_| CoreError::InvalidPrayerTime {
                value: value.to_string(),
            })
    }

    #[must_use]
    pub const fn as_naive_time(&self) -> NaiveTime {
        self.0
    }

    #[must_use]
    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    #[must_use]
    pub fn minute(&self) -> u32 {
        self.0.minute()
    }
}

impl fmt::Display for PrayerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(PRAYER_TIME_FORMAT))
    }
}

impl FromStr for PrayerTime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PrayerTime {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PrayerTime> for String {
    fn from(value: PrayerTime) -> Self {
        value.to_string()
    }
}

/// One day's prayer times for a location.
///
/// Entries are kept in daily order. A schedule may be partial (or empty) when
/// the upstream data is incomplete; consumers only consider what is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrayerSchedule {
    times: BTreeMap<Prayer, PrayerTime>,
}

impl PrayerSchedule {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a prayer time
    #[must_use]
    pub fn with(mut self, prayer: Prayer, time: PrayerTime) -> Self {
        self.times.insert(prayer, time);
        self
    }

    /// Build a schedule from raw `(name, "HH:MM")` pairs.
    ///
    /// Unknown prayer names (e.g. `imsak`, `terbit`) and unparsable times
    /// (the API reports missing values as `"-"`) are skipped.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut times = BTreeMap::new();
        for (name, value) in pairs {
            let Ok(prayer) = name.as_ref().parse::<Prayer>() else {
                continue;
            };
            match PrayerTime::parse(value.as_ref()) {
                Ok(time) => {
                    times.insert(prayer, time);
                }
                Err(e) => {
                    warn!(target: LOG_TARGET, "Skipping {}: {}", prayer, e);
                }
            }
        }
        Self { times }
    }

    /// Scheduled time for a prayer, if present
    #[must_use]
    pub fn get(&self, prayer: Prayer) -> Option<PrayerTime> {
        self.times.get(&prayer).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Iterate entries in daily order
    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = (Prayer, PrayerTime)> + '_ {
        self.times.iter().map(|(p, t)| (*p, *t))
    }
}

impl FromIterator<(Prayer, PrayerTime)> for PrayerSchedule {
    fn from_iter<T: IntoIterator<Item = (Prayer, PrayerTime)>>(iter: T) -> Self {
        Self {
            times: iter.into_iter().collect(),
        }
    }
}
