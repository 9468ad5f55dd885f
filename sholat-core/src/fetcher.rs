//! Schedule fetcher that keeps the countdown engine supplied with today's
//! prayer times.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use chrono::NaiveDate;

use crate::engine::CountdownEngine;
use crate::error::Result;
use crate::provider::{DailySchedule, PrayerDataProvider};
use crate::time::{elapsed_between, next_midnight, DurationExt};

const LOG_TARGET: &str = "sholat::fetcher";

/// Upper bound on a single wait, so a suspended machine notices the new day
/// soon after waking.
const RECHECK_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Slack after midnight before fetching the new day
const MIDNIGHT_SLACK: Duration = Duration::from_secs(1);

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Fetches the configured city's daily schedule and installs it in the engine,
/// refetching whenever the local date changes.
pub struct ScheduleFetcher {
    engine: Arc<CountdownEngine>,
    provider: Arc<dyn PrayerDataProvider>,
    city_id: String,
    cancel_token: CancellationToken,
}

impl ScheduleFetcher {
    /// Create a new schedule fetcher
    ///
    /// # Arguments
    /// * `engine` - Engine receiving the schedule
    /// * `provider` - Source of daily schedules
    /// * `city_id` - Provider-specific city ID
    /// * `cancel_token` - Optional external cancellation token for graceful shutdown
    #[must_use]
    pub fn new(
        engine: Arc<CountdownEngine>,
        provider: Arc<dyn PrayerDataProvider>,
        city_id: impl Into<String>,
        cancel_token: Option<CancellationToken>,
    ) -> Self {
        Self {
            engine,
            provider,
            city_id: city_id.into(),
            cancel_token: cancel_token.unwrap_or_default(),
        }
    }

    /// Get a clone of the cancellation token
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start the fetcher in a background task
    #[must_use]
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Fetch the schedule for `date` and install it in the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails.
    pub async fn fetch_and_install(&self, date: NaiveDate) -> Result<DailySchedule> {
        info!(
            target: LOG_TARGET,
            "Fetching schedule for city {} on {} (provider: {})",
            self.city_id,
            date,
            self.provider.name()
        );
        let daily = self.provider.daily_schedule(&self.city_id, date).await?;
        info!(
            target: LOG_TARGET,
            "Loaded schedule for {} ({}) with {} prayer(s)",
            daily.location,
            daily.date,
            daily.prayers.len()
        );
        self.engine.set_schedule(daily.prayers.clone()).await;
        Ok(daily)
    }

    async fn run(&self) {
        info!(target: LOG_TARGET, "Starting schedule fetcher for city {}", self.city_id);

        let mut loaded: Option<NaiveDate> = None;
        let mut consecutive_errors: u32 = 0;

        loop {
            let now = self.engine.now();
            let today = now.date();

            let wait = if loaded == Some(today) {
                elapsed_between(now, next_midnight(now))
                    .map_or(MIDNIGHT_SLACK, |d| d + MIDNIGHT_SLACK)
                    .min(RECHECK_INTERVAL)
            } else {
                match self.fetch_and_install(today).await {
                    Ok(_) => {
                        loaded = Some(today);
                        consecutive_errors = 0;
                        continue;
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        warn!(
                            target: LOG_TARGET,
                            "Schedule fetch failed (attempt {}): {}", consecutive_errors, e
                        );
                        let backoff = Duration::from_millis(
                            (100 * 2_u64.pow(consecutive_errors.min(10)))
                                .min(MAX_BACKOFF.as_millis_u64()),
                        );
                        if consecutive_errors >= 5 {
                            error!(
                                target: LOG_TARGET,
                                "Too many consecutive errors, waiting {} seconds",
                                backoff.as_secs()
                            );
                        }
                        backoff
                    }
                }
            };

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: LOG_TARGET, "Schedule fetcher shutting down");
                    break;
                }
                () = tokio::time::sleep(wait) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announcement::AnnouncementStore;
    use crate::audio::NullAudioSink;
    use crate::clock::ManualClock;
    use crate::countdown::PrayerClock;
    use crate::error::CoreError;
    use crate::prayer::PrayerSchedule;
    use crate::provider::{City, Hadith, Verse};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, m, s).unwrap()
    }

    /// Dzuhur moves one minute per day so schedules differ between dates
    fn schedule_for(date: NaiveDate) -> PrayerSchedule {
        use chrono::Datelike;
        PrayerSchedule::from_pairs([
            ("subuh", "04:30".to_string()),
            ("dzuhur", format!("12:{:02}", date.day())),
        ])
    }

    struct FakeProvider {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    impl FakeProvider {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }
    }

    fn unsupported() -> CoreError {
        CoreError::ApiResponse {
            provider: "fake".to_string(),
            endpoint: "-".to_string(),
            reason: "unsupported".to_string(),
        }
    }

    #[async_trait]
    impl PrayerDataProvider for FakeProvider {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn all_cities(&self) -> Result<Vec<City>> {
            Err(unsupported())
        }

        async fn search_cities(&self, _query: &str) -> Result<Vec<City>> {
            Err(unsupported())
        }

        async fn daily_schedule(&self, city_id: &str, date: NaiveDate) -> Result<DailySchedule> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(CoreError::ScheduleUnavailable {
                    city_id: city_id.to_string(),
                });
            }
            Ok(DailySchedule {
                city_id: city_id.to_string(),
                location: "KOTA BANDUNG".to_string(),
                region: "JAWA BARAT".to_string(),
                date,
                date_label: date.to_string(),
                imsak: None,
                terbit: None,
                prayers: schedule_for(date),
            })
        }

        async fn random_verse(&self) -> Result<Verse> {
            Err(unsupported())
        }

        async fn random_hadith(&self) -> Result<Hadith> {
            Err(unsupported())
        }
    }

    fn engine(time: Arc<ManualClock>) -> Arc<CountdownEngine> {
        let clock = PrayerClock::new(
            AnnouncementStore::new(Arc::new(MemoryStore::new())),
            Arc::new(NullAudioSink),
        );
        CountdownEngine::new(clock, time, None)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_schedule_loads() {
        let time = Arc::new(ManualClock::new(at(10, 9, 0, 0)));
        let engine = engine(time);
        let provider = Arc::new(FakeProvider::new(2));

        let fetcher = Arc::new(ScheduleFetcher::new(engine.clone(), provider.clone(), "1219", None));
        let token = fetcher.cancel_token();
        let handle = fetcher.start();

        tokio::time::sleep(Duration::from_secs(5)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.schedule().await, schedule_for(day(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetches_after_midnight() {
        let time = Arc::new(ManualClock::new(at(10, 23, 59, 0)));
        let engine = engine(time.clone());
        let provider = Arc::new(FakeProvider::new(0));

        let fetcher = Arc::new(ScheduleFetcher::new(engine.clone(), provider.clone(), "1219", None));
        let token = fetcher.cancel_token();
        let handle = fetcher.start();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(engine.schedule().await, schedule_for(day(10)));

        time.set(at(11, 0, 0, 30));
        tokio::time::sleep(Duration::from_secs(70)).await;
        assert_eq!(engine.schedule().await, schedule_for(day(11)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_and_install() {
        let time = Arc::new(ManualClock::new(at(10, 11, 45, 0)));
        let engine = engine(time);
        let fetcher = ScheduleFetcher::new(engine.clone(), Arc::new(FakeProvider::new(0)), "1219", None);

        let daily = fetcher.fetch_and_install(day(10)).await.unwrap();
        assert_eq!(daily.location, "KOTA BANDUNG");
        assert_eq!(engine.schedule().await, daily.prayers);
        assert_eq!(engine.view().await.unwrap().remaining_label, "25 menit lagi");
    }
}
