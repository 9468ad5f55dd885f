//! Announcement (adzan) state and the record persisted across restarts.

use crate::error::Result;
use crate::prayer::{Prayer, PrayerSchedule, PrayerTime};
use crate::storage::KeyValueStore;
use crate::time::elapsed_between;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const LOG_TARGET: &str = "sholat::announcement";

/// Storage key of the persisted record.
pub const LAST_ANNOUNCEMENT_KEY: &str = "lastAdzan";

/// How long an announcement stays active after the prayer time arrives.
pub const DEFAULT_ANNOUNCE_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Whether an adzan is currently being announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnnouncementState {
    #[default]
    Idle,
    Announcing {
        prayer: Prayer,
        started_at: NaiveDateTime,
    },
}

impl AnnouncementState {
    #[must_use]
    pub const fn is_announcing(&self) -> bool {
        matches!(self, Self::Announcing { .. })
    }

    /// The prayer being announced, if any
    #[must_use]
    pub const fn prayer(&self) -> Option<Prayer> {
        match self {
            Self::Announcing { prayer, .. } => Some(*prayer),
            Self::Idle => None,
        }
    }
}

/// Record of the most recent announcement, written when it begins.
///
/// `prayer_time` pins the schedule the announcement belonged to: once the
/// schedule's time for `prayer` differs (another city, another day) the record
/// is stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastAnnouncement {
    pub prayer: Prayer,
    pub time: PrayerTime,
    #[serde(with = "started_at_format")]
    pub started_at: NaiveDateTime,
    pub prayer_time: PrayerTime,
}

impl LastAnnouncement {
    /// Record an announcement of `prayer` (scheduled at `time`) starting at `started_at`.
    #[must_use]
    pub fn new(prayer: Prayer, time: PrayerTime, started_at: NaiveDateTime) -> Self {
        Self {
            prayer,
            time,
            started_at: crate::time::truncate_to_second(started_at),
            prayer_time: time,
        }
    }

    /// Whether the record still belongs to `schedule`.
    #[must_use]
    pub fn matches_schedule(&self, schedule: &PrayerSchedule) -> bool {
        schedule.get(self.prayer) == Some(self.prayer_time)
    }

    /// Time since the announcement started, if it lies within `[0, window)`.
    #[must_use]
    pub fn active_offset(&self, now: NaiveDateTime, window: Duration) -> Option<Duration> {
        elapsed_between(self.started_at, now).filter(|elapsed| *elapsed < window)
    }
}

mod started_at_format {
    use crate::time::STARTED_AT_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(STARTED_AT_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, STARTED_AT_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Typed access to the persisted [`LastAnnouncement`].
#[derive(Clone)]
pub struct AnnouncementStore {
    store: Arc<dyn KeyValueStore>,
}

impl AnnouncementStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read the record. A record that fails to parse is deleted and reported
    /// as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    pub fn load(&self) -> Result<Option<LastAnnouncement>> {
        let Some(raw) = self.store.get(LAST_ANNOUNCEMENT_KEY)? else {
            return Ok(None);
        };

        match serde_json::from_str::<LastAnnouncement>(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                debug!(target: LOG_TARGET, "Discarding malformed announcement record: {}", e);
                if let Err(e) = self.store.delete(LAST_ANNOUNCEMENT_KEY) {
                    warn!(target: LOG_TARGET, "Failed to delete malformed announcement record: {}", e);
                }
                Ok(None)
            }
        }
    }

    /// Persist the record, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    pub fn save(&self, record: &LastAnnouncement) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        self.store.set(LAST_ANNOUNCEMENT_KEY, &raw)
    }

    /// Remove the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be written.
    pub fn clear(&self) -> Result<()> {
        self.store.delete(LAST_ANNOUNCEMENT_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn noon() -> PrayerTime {
        PrayerTime::from_hm(12, 0).unwrap()
    }

    #[test]
    fn test_record_json_shape() {
        let record = LastAnnouncement::new(Prayer::Dzuhur, noon(), at(12, 0, 0));
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();

        assert_eq!(json["prayer"], "dzuhur");
        assert_eq!(json["time"], "12:00");
        assert_eq!(json["startedAt"], "2024-03-10 12:00:00");
        assert_eq!(json["prayerTime"], "12:00");
    }

    #[test]
    fn test_record_parses_stored_json() {
        let raw = r#"{"prayer":"ashar","time":"15:15","startedAt":"2024-03-10 15:15:03","prayerTime":"15:15"}"#;
        let record: LastAnnouncement = serde_json::from_str(raw).unwrap();

        assert_eq!(record.prayer, Prayer::Ashar);
        assert_eq!(record.started_at, at(15, 15, 3));
        assert_eq!(record.prayer_time, PrayerTime::from_hm(15, 15).unwrap());
    }

    #[test]
    fn test_new_record_drops_subseconds() {
        let started = at(12, 0, 0) + chrono::Duration::milliseconds(750);
        let record = LastAnnouncement::new(Prayer::Dzuhur, noon(), started);
        assert_eq!(record.started_at, at(12, 0, 0));
    }

    #[test]
    fn test_matches_schedule() {
        let record = LastAnnouncement::new(Prayer::Dzuhur, PrayerTime::from_hm(12, 10).unwrap(), at(12, 10, 0));

        let same = PrayerSchedule::new().with(Prayer::Dzuhur, PrayerTime::from_hm(12, 10).unwrap());
        let moved = PrayerSchedule::new().with(Prayer::Dzuhur, PrayerTime::from_hm(12, 15).unwrap());
        let missing = PrayerSchedule::new().with(Prayer::Ashar, PrayerTime::from_hm(15, 0).unwrap());

        assert!(record.matches_schedule(&same));
        assert!(!record.matches_schedule(&moved));
        assert!(!record.matches_schedule(&missing));
    }

    #[test]
    fn test_active_offset_window_bounds() {
        let record = LastAnnouncement::new(Prayer::Dzuhur, noon(), at(12, 0, 0));

        assert_eq!(
            record.active_offset(at(12, 0, 0), DEFAULT_ANNOUNCE_WINDOW),
            Some(Duration::ZERO)
        );
        assert_eq!(
            record.active_offset(at(12, 4, 59), DEFAULT_ANNOUNCE_WINDOW),
            Some(Duration::from_secs(299))
        );
        assert_eq!(record.active_offset(at(12, 5, 0), DEFAULT_ANNOUNCE_WINDOW), None);
        assert_eq!(record.active_offset(at(11, 59, 59), DEFAULT_ANNOUNCE_WINDOW), None);
    }

    #[test]
    fn test_store_round_trip_and_clear() {
        let store = AnnouncementStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(store.load().unwrap(), None);

        let record = LastAnnouncement::new(Prayer::Maghrib, PrayerTime::from_hm(18, 0).unwrap(), at(18, 0, 1));
        store.save(&record).unwrap();
        assert_eq!(store.load().unwrap(), Some(record));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_store_discards_malformed_record() {
        let backing = Arc::new(MemoryStore::new());
        backing.set(LAST_ANNOUNCEMENT_KEY, "{not json").unwrap();

        let store = AnnouncementStore::new(backing.clone());
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(backing.get(LAST_ANNOUNCEMENT_KEY).unwrap(), None);
    }

    #[test]
    fn test_store_discards_record_with_bad_timestamp() {
        let backing = Arc::new(MemoryStore::new());
        backing
            .set(
                LAST_ANNOUNCEMENT_KEY,
                r#"{"prayer":"isya","time":"19:15","startedAt":"yesterday","prayerTime":"19:15"}"#,
            )
            .unwrap();

        let store = AnnouncementStore::new(backing.clone());
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(backing.get(LAST_ANNOUNCEMENT_KEY).unwrap(), None);
    }

    #[test]
    fn test_state_accessors() {
        assert!(!AnnouncementState::Idle.is_announcing());
        let state = AnnouncementState::Announcing {
            prayer: Prayer::Subuh,
            started_at: at(4, 30, 0),
        };
        assert!(state.is_announcing());
        assert_eq!(state.prayer(), Some(Prayer::Subuh));
    }
}
