//! The prayer clock: next-prayer countdown and adzan detection.
//!
//! [`PrayerClock::tick`] is evaluated once per second against the current
//! wall-clock time and the day's [`PrayerSchedule`]. Each evaluation:
//!
//! 1. resumes an announcement recorded in the [`AnnouncementStore`] if it
//!    belongs to the current schedule and started less than one window ago
//!    (audio is resumed at the elapsed offset after a restart),
//! 2. discards the record when the schedule no longer matches it,
//! 3. otherwise finds the nearest upcoming prayer, rolling times that have
//!    already passed today over to tomorrow,
//! 4. starts a new announcement when that prayer is due this minute.

use crate::announcement::{
    AnnouncementState, AnnouncementStore, LastAnnouncement, DEFAULT_ANNOUNCE_WINDOW,
};
use crate::audio::AudioSink;
use crate::label::{
    remaining_label, ANNOUNCING_LABEL, HEADING_ANNOUNCING, HEADING_UPCOMING, UNAVAILABLE_LABEL,
};
use crate::prayer::{Prayer, PrayerSchedule, PrayerTime};
use crate::time::truncate_to_minute;
use chrono::{Duration as ChronoDuration, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "sholat::clock";

/// What the countdown shows right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownView {
    /// Prayer being counted down to (or announced). `None` without a schedule.
    pub next_prayer: Option<Prayer>,
    /// Whole minutes until `next_prayer`; `None` while announcing or unavailable.
    pub remaining_minutes: Option<i64>,
    pub remaining_label: String,
    pub announcing: bool,
}

impl CountdownView {
    fn announcing(prayer: Prayer) -> Self {
        Self {
            next_prayer: Some(prayer),
            remaining_minutes: None,
            remaining_label: ANNOUNCING_LABEL.to_string(),
            announcing: true,
        }
    }

    fn upcoming(prayer: Prayer, minutes: i64) -> Self {
        Self {
            next_prayer: Some(prayer),
            remaining_minutes: Some(minutes),
            remaining_label: remaining_label(minutes),
            announcing: false,
        }
    }

    /// View used when no schedule entries exist.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            next_prayer: None,
            remaining_minutes: None,
            remaining_label: UNAVAILABLE_LABEL.to_string(),
            announcing: false,
        }
    }

    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.next_prayer.is_some()
    }

    /// Section heading matching the view
    #[must_use]
    pub const fn heading(&self) -> &'static str {
        if self.announcing {
            HEADING_ANNOUNCING
        } else {
            HEADING_UPCOMING
        }
    }
}

/// The nearest prayer at or after a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpcomingPrayer {
    pub prayer: Prayer,
    pub time: PrayerTime,
    /// Whole minutes from `now` (truncated to the minute) to the prayer.
    pub minutes: i64,
}

/// Find the nearest upcoming prayer.
///
/// Comparison happens at minute precision. A time earlier than `now` today is
/// taken as tomorrow's occurrence, so after the last prayer of the day the
/// first one of the next day is selected. Returns `None` for an empty schedule.
#[must_use]
pub fn next_prayer(now: NaiveDateTime, schedule: &PrayerSchedule) -> Option<UpcomingPrayer> {
    let now = truncate_to_minute(now);

    schedule
        .iter()
        .map(|(prayer, time)| {
            let mut at = now.date().and_time(time.as_naive_time());
            if at < now {
                at += ChronoDuration::days(1);
            }
            UpcomingPrayer {
                prayer,
                time,
                minutes: (at - now).num_minutes(),
            }
        })
        .filter(|candidate| candidate.minutes >= 0)
        .min_by_key(|candidate| candidate.minutes)
}

/// Countdown and announcement state machine.
///
/// Owns the audio sink: playback starts once when an announcement is entered
/// and stops whenever the clock leaves it, is given a new schedule, or is
/// disposed.
pub struct PrayerClock {
    records: AnnouncementStore,
    audio: Arc<dyn AudioSink>,
    window: Duration,
    state: AnnouncementState,
}

impl PrayerClock {
    /// Create a clock with the default five minute announcement window
    #[must_use]
    pub fn new(records: AnnouncementStore, audio: Arc<dyn AudioSink>) -> Self {
        Self {
            records,
            audio,
            window: DEFAULT_ANNOUNCE_WINDOW,
            state: AnnouncementState::Idle,
        }
    }

    /// Override the announcement window
    #[must_use]
    pub const fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    #[must_use]
    pub const fn state(&self) -> AnnouncementState {
        self.state
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Evaluate the countdown at `now`.
    ///
    /// An empty schedule means none has loaded yet: the view is unavailable and
    /// the persisted record is left alone so it can be resumed once one arrives.
    pub fn tick(&mut self, now: NaiveDateTime, schedule: &PrayerSchedule) -> CountdownView {
        if schedule.is_empty() {
            self.leave_announcing();
            return CountdownView::unavailable();
        }

        if let Some(record) = self.load_record() {
            if record.matches_schedule(schedule) {
                if let Some(offset) = record.active_offset(now, self.window) {
                    self.enter_announcing(record.prayer, record.started_at, offset);
                    return CountdownView::announcing(record.prayer);
                }
            } else {
                self.discard_stale(&record);
            }
        }

        let Some(upcoming) = next_prayer(now, schedule) else {
            self.leave_announcing();
            return CountdownView::unavailable();
        };

        if upcoming.minutes == 0 {
            if self.state.prayer() != Some(upcoming.prayer) {
                let record = LastAnnouncement::new(upcoming.prayer, upcoming.time, now);
                if let Err(e) = self.records.save(&record) {
                    warn!(target: LOG_TARGET, "Failed to persist announcement for {}: {}", upcoming.prayer, e);
                }
                self.enter_announcing(upcoming.prayer, record.started_at, Duration::ZERO);
            }
            return CountdownView::announcing(upcoming.prayer);
        }

        self.leave_announcing();
        CountdownView::upcoming(upcoming.prayer, upcoming.minutes)
    }

    /// Prepare for a new schedule (another city or another day).
    ///
    /// Stops any playing audio and drops the persisted record if it belongs to
    /// a different schedule. An announcement that still matches is picked up
    /// again by the next [`tick`](Self::tick).
    pub fn replace_schedule(&mut self, schedule: &PrayerSchedule) {
        self.audio.stop();
        self.state = AnnouncementState::Idle;

        if schedule.is_empty() {
            return;
        }
        if let Some(record) = self.load_record() {
            if !record.matches_schedule(schedule) {
                self.discard_stale(&record);
            }
        }
    }

    /// Stop audio and return to idle. The persisted record is kept so a later
    /// start can resume the announcement.
    pub fn dispose(&mut self) {
        self.audio.stop();
        self.state = AnnouncementState::Idle;
    }

    fn load_record(&self) -> Option<LastAnnouncement> {
        match self.records.load() {
            Ok(record) => record,
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to read announcement record: {}", e);
                None
            }
        }
    }

    fn discard_stale(&mut self, record: &LastAnnouncement) {
        debug!(
            target: LOG_TARGET,
            "Discarding stale announcement record for {} at {}",
            record.prayer, record.prayer_time
        );
        if let Err(e) = self.records.clear() {
            warn!(target: LOG_TARGET, "Failed to delete stale announcement record: {}", e);
        }
        self.leave_announcing();
    }

    fn enter_announcing(&mut self, prayer: Prayer, started_at: NaiveDateTime, offset: Duration) {
        let next = AnnouncementState::Announcing { prayer, started_at };
        if self.state == next {
            return;
        }
        if self.state.is_announcing() {
            self.audio.stop();
        }
        self.state = next;

        info!(target: LOG_TARGET, "Adzan {} started (audio offset {:?})", prayer, offset);
        if let Err(e) = self.audio.play(offset) {
            warn!(target: LOG_TARGET, "Failed to play adzan audio: {}", e);
        }
    }

    fn leave_announcing(&mut self) {
        if let AnnouncementState::Announcing { prayer, .. } = self.state {
            info!(target: LOG_TARGET, "Adzan {} ended", prayer);
            self.audio.stop();
            self.state = AnnouncementState::Idle;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{AudioCall, RecordingAudio};
    use super::*;
    use crate::announcement::LAST_ANNOUNCEMENT_KEY;
    use crate::error::{CoreError, Result};
    use crate::storage::{KeyValueStore, MemoryStore};
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn hm(h: u32, m: u32) -> PrayerTime {
        PrayerTime::from_hm(h, m).unwrap()
    }

    fn schedule() -> PrayerSchedule {
        PrayerSchedule::new()
            .with(Prayer::Subuh, hm(4, 30))
            .with(Prayer::Dzuhur, hm(12, 0))
            .with(Prayer::Ashar, hm(15, 15))
            .with(Prayer::Maghrib, hm(18, 0))
            .with(Prayer::Isya, hm(19, 15))
    }

    struct Harness {
        backing: Arc<MemoryStore>,
        audio: Arc<RecordingAudio>,
        clock: PrayerClock,
    }

    fn harness() -> Harness {
        let backing = Arc::new(MemoryStore::new());
        let audio = Arc::new(RecordingAudio::default());
        let clock = PrayerClock::new(AnnouncementStore::new(backing.clone()), audio.clone());
        Harness {
            backing,
            audio,
            clock,
        }
    }

    fn stored_record(backing: &MemoryStore) -> Option<LastAnnouncement> {
        backing
            .get(LAST_ANNOUNCEMENT_KEY)
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    #[test]
    fn test_next_prayer_between_prayers() {
        let view = harness().clock.tick(at(11, 45, 0), &schedule());

        assert_eq!(view.next_prayer, Some(Prayer::Dzuhur));
        assert_eq!(view.remaining_minutes, Some(15));
        assert_eq!(view.remaining_label, "15 menit lagi");
        assert!(!view.announcing);
        assert_eq!(view.heading(), "Menuju Waktu Sholat");
    }

    #[test]
    fn test_next_prayer_hours_label() {
        let view = harness().clock.tick(at(12, 50, 30), &schedule());

        assert_eq!(view.next_prayer, Some(Prayer::Ashar));
        assert_eq!(view.remaining_label, "2 jam 25 menit lagi");
    }

    #[test]
    fn test_every_minute_between_consecutive_prayers() {
        let schedule = schedule();
        // 12:01 .. 15:14 all count down to ashar
        let mut now = at(12, 1, 0);
        while now < at(15, 15, 0) {
            let upcoming = next_prayer(now, &schedule).unwrap();
            assert_eq!(upcoming.prayer, Prayer::Ashar);
            assert_eq!(upcoming.minutes, (at(15, 15, 0) - now).num_minutes());
            now += ChronoDuration::minutes(7);
        }
    }

    #[test]
    fn test_rollover_after_isya() {
        let mut h = harness();

        let view = h.clock.tick(at(19, 16, 0), &schedule());
        assert_eq!(view.next_prayer, Some(Prayer::Subuh));
        // 19:16 -> 04:30 next day
        assert_eq!(view.remaining_minutes, Some(9 * 60 + 14));
        assert_eq!(view.remaining_label, "9 jam 14 menit lagi");

        let view = h.clock.tick(at(23, 59, 59), &schedule());
        assert_eq!(view.next_prayer, Some(Prayer::Subuh));
        assert_eq!(view.remaining_label, "4 jam 31 menit lagi");
    }

    #[test]
    fn test_after_midnight_before_subuh() {
        let view = harness().clock.tick(at(0, 10, 0), &schedule());
        assert_eq!(view.next_prayer, Some(Prayer::Subuh));
        assert_eq!(view.remaining_label, "4 jam 20 menit lagi");
    }

    #[test]
    fn test_ticks_within_a_minute_are_idempotent() {
        let mut h = harness();
        let first = h.clock.tick(at(11, 45, 0), &schedule());
        for s in 1..60 {
            assert_eq!(h.clock.tick(at(11, 45, s), &schedule()), first);
        }
        let next_minute = h.clock.tick(at(11, 46, 0), &schedule());
        assert_eq!(next_minute.remaining_label, "14 menit lagi");
        assert!(h.audio.calls().is_empty());
    }

    #[test]
    fn test_prayer_time_starts_announcement() {
        let mut h = harness();
        let view = h.clock.tick(at(12, 0, 0), &schedule());

        assert!(view.announcing);
        assert_eq!(view.next_prayer, Some(Prayer::Dzuhur));
        assert_eq!(view.remaining_label, "Adzan Berkumandang");
        assert_eq!(view.heading(), "Waktu Sholat");
        assert_eq!(h.audio.calls(), vec![AudioCall::Play(Duration::ZERO)]);

        let record = stored_record(&h.backing).unwrap();
        assert_eq!(record.prayer, Prayer::Dzuhur);
        assert_eq!(record.time, hm(12, 0));
        assert_eq!(record.prayer_time, hm(12, 0));
        assert_eq!(record.started_at, at(12, 0, 0));
    }

    #[test]
    fn test_audio_plays_once_per_announcement() {
        let mut h = harness();
        let schedule = schedule();

        let mut now = at(12, 0, 0);
        while now < at(12, 4, 59) {
            assert!(h.clock.tick(now, &schedule).announcing);
            now += ChronoDuration::seconds(1);
        }

        assert_eq!(h.audio.plays(), vec![Duration::ZERO]);
        assert!(!h.audio.calls().contains(&AudioCall::Stop));
    }

    #[test]
    fn test_announcement_ends_after_window() {
        let mut h = harness();
        let schedule = schedule();

        h.clock.tick(at(12, 0, 0), &schedule);
        assert!(h.clock.tick(at(12, 4, 59), &schedule).announcing);

        let view = h.clock.tick(at(12, 5, 0), &schedule);
        assert!(!view.announcing);
        assert_eq!(view.next_prayer, Some(Prayer::Ashar));
        assert_eq!(h.clock.state(), AnnouncementState::Idle);
        assert_eq!(
            h.audio.calls(),
            vec![AudioCall::Play(Duration::ZERO), AudioCall::Stop]
        );

        // Expired record stays but does not restart anything
        assert!(stored_record(&h.backing).is_some());
        h.clock.tick(at(12, 5, 1), &schedule);
        assert_eq!(h.audio.calls().len(), 2);
    }

    #[test]
    fn test_announcement_started_mid_minute() {
        let mut h = harness();
        let view = h.clock.tick(at(12, 0, 42), &schedule());

        assert!(view.announcing);
        assert_eq!(stored_record(&h.backing).unwrap().started_at, at(12, 0, 42));
    }

    #[test]
    fn test_reload_recovery_resumes_audio_at_offset() {
        let mut h = harness();
        let record = LastAnnouncement::new(Prayer::Dzuhur, hm(12, 0), at(12, 0, 0));
        AnnouncementStore::new(h.backing.clone()).save(&record).unwrap();

        let view = h.clock.tick(at(12, 2, 0), &schedule());

        assert!(view.announcing);
        assert_eq!(view.next_prayer, Some(Prayer::Dzuhur));
        assert_eq!(view.remaining_label, "Adzan Berkumandang");
        assert_eq!(h.audio.plays(), vec![Duration::from_secs(120)]);

        // Subsequent ticks keep announcing without seeking again
        h.clock.tick(at(12, 2, 1), &schedule());
        h.clock.tick(at(12, 3, 30), &schedule());
        assert_eq!(h.audio.plays().len(), 1);
    }

    #[test]
    fn test_stale_record_is_discarded() {
        let mut h = harness();
        let record = LastAnnouncement::new(Prayer::Dzuhur, hm(12, 10), at(12, 10, 0));
        AnnouncementStore::new(h.backing.clone()).save(&record).unwrap();

        let schedule = schedule().with(Prayer::Dzuhur, hm(12, 15));
        let view = h.clock.tick(at(12, 11, 0), &schedule);

        assert!(!view.announcing);
        assert_eq!(view.next_prayer, Some(Prayer::Dzuhur));
        assert_eq!(view.remaining_label, "4 menit lagi");
        assert!(stored_record(&h.backing).is_none());
        assert!(h.audio.plays().is_empty());
    }

    #[test]
    fn test_malformed_record_is_ignored() {
        let mut h = harness();
        h.backing.set(LAST_ANNOUNCEMENT_KEY, "][").unwrap();

        let view = h.clock.tick(at(11, 45, 0), &schedule());

        assert_eq!(view.remaining_label, "15 menit lagi");
        assert_eq!(h.backing.get(LAST_ANNOUNCEMENT_KEY).unwrap(), None);
    }

    #[test]
    fn test_empty_schedule_is_unavailable() {
        let mut h = harness();
        let view = h.clock.tick(at(11, 45, 0), &PrayerSchedule::new());

        assert_eq!(view, CountdownView::unavailable());
        assert_eq!(view.remaining_label, "Jadwal tidak tersedia");
        assert!(!view.is_available());
    }

    #[test]
    fn test_empty_schedule_keeps_record_for_later_resume() {
        let mut h = harness();
        let record = LastAnnouncement::new(Prayer::Dzuhur, hm(12, 0), at(12, 0, 0));
        AnnouncementStore::new(h.backing.clone()).save(&record).unwrap();

        let view = h.clock.tick(at(12, 2, 0), &PrayerSchedule::new());
        assert_eq!(view, CountdownView::unavailable());
        h.clock.replace_schedule(&PrayerSchedule::new());
        assert_eq!(stored_record(&h.backing), Some(record));
        assert!(h.audio.plays().is_empty());

        h.clock.replace_schedule(&schedule());
        let view = h.clock.tick(at(12, 2, 0), &schedule());
        assert!(view.announcing);
        assert_eq!(h.audio.plays(), vec![Duration::from_secs(120)]);
    }

    #[test]
    fn test_partial_schedule_still_counts_down() {
        let schedule = PrayerSchedule::new().with(Prayer::Maghrib, hm(18, 0));
        let view = harness().clock.tick(at(19, 0, 0), &schedule);

        assert_eq!(view.next_prayer, Some(Prayer::Maghrib));
        assert_eq!(view.remaining_label, "23 jam 0 menit lagi");
    }

    #[test]
    fn test_replace_schedule_stops_audio_and_drops_stale_record() {
        let mut h = harness();
        h.clock.tick(at(12, 0, 0), &schedule());
        h.audio.clear();

        let other_city = schedule().with(Prayer::Dzuhur, hm(11, 52));
        h.clock.replace_schedule(&other_city);

        assert_eq!(h.audio.calls(), vec![AudioCall::Stop]);
        assert_eq!(h.clock.state(), AnnouncementState::Idle);
        assert!(stored_record(&h.backing).is_none());

        let view = h.clock.tick(at(12, 0, 5), &other_city);
        assert!(!view.announcing);
        assert_eq!(view.next_prayer, Some(Prayer::Ashar));
    }

    #[test]
    fn test_replace_with_same_schedule_resumes_on_next_tick() {
        let mut h = harness();
        h.clock.tick(at(12, 0, 0), &schedule());
        h.clock.replace_schedule(&schedule());
        h.audio.clear();

        assert!(h.clock.tick(at(12, 1, 0), &schedule()).announcing);
        assert_eq!(h.audio.plays(), vec![Duration::from_secs(60)]);
    }

    #[test]
    fn test_dispose_stops_audio_and_keeps_record() {
        let mut h = harness();
        h.clock.tick(at(18, 0, 0), &schedule());
        h.clock.dispose();

        assert_eq!(h.audio.calls().last(), Some(&AudioCall::Stop));
        assert_eq!(h.clock.state(), AnnouncementState::Idle);
        assert!(stored_record(&h.backing).is_some());
    }

    #[test]
    fn test_custom_window() {
        let backing = Arc::new(MemoryStore::new());
        let audio = Arc::new(RecordingAudio::default());
        let mut clock = PrayerClock::new(AnnouncementStore::new(backing), audio)
            .with_window(Duration::from_secs(60));

        assert!(clock.tick(at(12, 0, 0), &schedule()).announcing);
        assert!(clock.tick(at(12, 0, 59), &schedule()).announcing);
        assert!(!clock.tick(at(12, 1, 0), &schedule()).announcing);
    }

    #[test]
    fn test_audio_failure_does_not_block_countdown() {
        let backing = Arc::new(MemoryStore::new());
        let audio = Arc::new(RecordingAudio::failing());
        let mut clock = PrayerClock::new(AnnouncementStore::new(backing), audio.clone());

        assert!(clock.tick(at(12, 0, 0), &schedule()).announcing);
        assert!(clock.tick(at(12, 0, 1), &schedule()).announcing);
        // Not retried every tick
        assert_eq!(audio.plays().len(), 1);
    }

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(CoreError::StorageError {
                reason: "read-only".to_string(),
            })
        }

        fn delete(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_persist_failure_still_announces_once() {
        let audio = Arc::new(RecordingAudio::default());
        let mut clock = PrayerClock::new(AnnouncementStore::new(Arc::new(ReadOnlyStore)), audio.clone());

        assert!(clock.tick(at(12, 0, 0), &schedule()).announcing);
        assert!(clock.tick(at(12, 0, 30), &schedule()).announcing);
        assert_eq!(audio.plays(), vec![Duration::ZERO]);
    }
}
