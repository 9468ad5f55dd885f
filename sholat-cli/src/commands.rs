use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use sholat_core::{
    AnnouncementStore, AudioSink, City, ClockEvent, CountdownEngine, CountdownView,
    DailySchedule, Hadith, JsonFileStore, NullAudioSink, PrayerClock, PrayerDataProvider,
    PrayerSchedule, PrayerTime, ScheduleFetcher, SholatConfig, SystemClock, Verse,
};
use sholat_myquran::MyQuranProvider;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audio::BellAudioSink;

const LOG_TARGET: &str = "sholat::cli";

pub fn provider(config: &SholatConfig) -> Result<Arc<dyn PrayerDataProvider>> {
    let provider = MyQuranProvider::with_config(
        &config.api.base_url,
        config.api.timeout_secs,
        config.api.max_retries,
    )
    .context("failed to create HTTP client")?;
    Ok(Arc::new(provider))
}

/// Pick the adzan output: the configured recording when built with audio
/// support, a terminal bell otherwise.
fn audio_sink(config: &SholatConfig, quiet: bool) -> Arc<dyn AudioSink> {
    if quiet {
        return Arc::new(NullAudioSink);
    }

    #[cfg(feature = "audio")]
    if let Some(path) = &config.announcement.audio_file {
        match crate::audio::RodioAudioSink::new(path, config.announcement.volume) {
            Ok(sink) => return Arc::new(sink),
            Err(e) => warn!(target: LOG_TARGET, "Falling back to terminal bell: {}", e),
        }
    }

    #[cfg(not(feature = "audio"))]
    if config.announcement.audio_file.is_some() {
        warn!(
            target: LOG_TARGET,
            "announcement.audio_file is set but this build has no audio support; using terminal bell"
        );
    }

    Arc::new(BellAudioSink)
}

/// Run the live countdown until Ctrl+C.
pub async fn watch(
    config: &SholatConfig,
    city_id: &str,
    quiet: bool,
    cancel_token: CancellationToken,
) -> Result<()> {
    let provider = provider(config)?;

    let store = Arc::new(JsonFileStore::new());
    info!(target: LOG_TARGET, "Announcement state stored at {}", store.path().display());

    let clock = PrayerClock::new(AnnouncementStore::new(store), audio_sink(config, quiet))
        .with_window(config.announcement.window());
    let engine = CountdownEngine::new(clock, Arc::new(SystemClock), Some(cancel_token.clone()));
    let mut events = engine.subscribe();

    let fetcher = Arc::new(ScheduleFetcher::new(
        engine.clone(),
        provider,
        city_id,
        Some(cancel_token.clone()),
    ));

    let engine_handle = engine.clone().start();
    let fetcher_handle = fetcher.start();

    let mut current = PrayerSchedule::new();
    let mut last_line = String::new();

    loop {
        let event = tokio::select! {
            () = cancel_token.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(ClockEvent::ScheduleChanged { schedule: new }) => {
                print!("{}", format_prayers(&new));
                current = new;
            }
            Ok(ClockEvent::Tick { view }) => {
                let line = format_view(&view, &current);
                if line != last_line {
                    println!("{line}");
                    last_line = line;
                }
            }
            Ok(ClockEvent::AnnouncementStarted { prayer }) => {
                info!(target: LOG_TARGET, "Adzan {} berkumandang", prayer.display_name());
            }
            Ok(
                ClockEvent::NextPrayerChanged { .. }
                | ClockEvent::AnnouncementEnded { .. }
                | ClockEvent::ScheduleUnavailable,
            ) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(target: LOG_TARGET, "Display fell behind, skipped {} event(s)", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }

    engine.stop();
    let _ = tokio::join!(engine_handle, fetcher_handle);
    Ok(())
}

/// Print one day's schedule.
pub async fn schedule(config: &SholatConfig, city_id: &str, date: Option<NaiveDate>) -> Result<()> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let daily = provider(config)?
        .daily_schedule(city_id, date)
        .await
        .with_context(|| format!("failed to load schedule for city {city_id} on {date}"))?;
    print!("{}", format_daily(&daily));
    Ok(())
}

/// List cities, optionally filtered by name.
pub async fn cities(config: &SholatConfig, query: Option<&str>) -> Result<()> {
    let provider = provider(config)?;
    let cities = match query {
        Some(q) => provider.search_cities(q).await?,
        None => provider.all_cities().await?,
    };
    if cities.is_empty() {
        println!("Kota tidak ditemukan");
    } else {
        print!("{}", format_cities(&cities));
    }
    Ok(())
}

pub async fn ayat(config: &SholatConfig) -> Result<()> {
    let verse = provider(config)?.random_verse().await?;
    print!("{}", format_verse(&verse));
    Ok(())
}

pub async fn hadith(config: &SholatConfig) -> Result<()> {
    let hadith = provider(config)?.random_hadith().await?;
    print!("{}", format_hadith(&hadith));
    Ok(())
}

fn format_view(view: &CountdownView, schedule: &PrayerSchedule) -> String {
    let Some(prayer) = view.next_prayer else {
        return view.remaining_label.clone();
    };
    let time = schedule
        .get(prayer)
        .map(|t| format!(" {t}"))
        .unwrap_or_default();
    format!(
        "{}: {}{} - {}",
        view.heading(),
        prayer.display_name(),
        time,
        view.remaining_label
    )
}

fn format_prayers(schedule: &PrayerSchedule) -> String {
    let mut out = String::new();
    for (prayer, time) in schedule.iter() {
        let _ = writeln!(out, "  {:<8} {}", prayer.display_name(), time);
    }
    out
}

fn format_daily(daily: &DailySchedule) -> String {
    let mut rows: Vec<(&str, PrayerTime)> = daily
        .prayers
        .iter()
        .map(|(prayer, time)| (prayer.display_name(), time))
        .collect();
    rows.extend(daily.imsak.map(|t| ("Imsak", t)));
    rows.extend(daily.terbit.map(|t| ("Terbit", t)));
    rows.sort_by_key(|(_, time)| *time);

    let mut out = String::new();
    let _ = writeln!(out, "{}, {}", daily.location, daily.region);
    let _ = writeln!(out, "{}", daily.date_label);
    for (name, time) in rows {
        let _ = writeln!(out, "  {name:<8} {time}");
    }
    out
}

fn format_cities(cities: &[City]) -> String {
    let mut out = String::new();
    for city in cities {
        let _ = writeln!(out, "{:>6}  {}", city.id, city.name);
    }
    out
}

fn format_verse(verse: &Verse) -> String {
    format!(
        "{}\n\n{}\n\nQS. {} : {}\n",
        verse.arabic, verse.translation, verse.surah_name, verse.ayah_number
    )
}

fn format_hadith(hadith: &Hadith) -> String {
    format!(
        "{}\n\n{}\n\nHR. {} No. {}\n",
        hadith.arabic, hadith.translation, hadith.narrator, hadith.number
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sholat_core::Prayer;

    fn schedule() -> PrayerSchedule {
        PrayerSchedule::from_pairs([("subuh", "04:32"), ("dzuhur", "12:01"), ("isya", "19:16")])
    }

    #[test]
    fn test_format_upcoming_view() {
        let view = CountdownView {
            next_prayer: Some(Prayer::Dzuhur),
            remaining_minutes: Some(16),
            remaining_label: "16 menit lagi".to_string(),
            announcing: false,
        };
        assert_eq!(
            format_view(&view, &schedule()),
            "Menuju Waktu Sholat: Dzuhur 12:01 - 16 menit lagi"
        );
    }

    #[test]
    fn test_format_announcing_view() {
        let view = CountdownView {
            next_prayer: Some(Prayer::Isya),
            remaining_minutes: None,
            remaining_label: "Adzan Berkumandang".to_string(),
            announcing: true,
        };
        assert_eq!(
            format_view(&view, &schedule()),
            "Waktu Sholat: Isya 19:16 - Adzan Berkumandang"
        );
    }

    #[test]
    fn test_format_unavailable_view() {
        assert_eq!(
            format_view(&CountdownView::unavailable(), &PrayerSchedule::new()),
            "Jadwal tidak tersedia"
        );
    }

    #[test]
    fn test_format_daily_orders_rows() {
        let daily = DailySchedule {
            city_id: "1219".to_string(),
            location: "KOTA BANDUNG".to_string(),
            region: "JAWA BARAT".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            date_label: "Minggu, 10/03/2024".to_string(),
            imsak: PrayerTime::from_hm(4, 22),
            terbit: PrayerTime::from_hm(5, 45),
            prayers: schedule(),
        };
        assert_eq!(
            format_daily(&daily),
            "KOTA BANDUNG, JAWA BARAT\n\
             Minggu, 10/03/2024\n  \
             Imsak    04:22\n  \
             Subuh    04:32\n  \
             Terbit   05:45\n  \
             Dzuhur   12:01\n  \
             Isya     19:16\n"
        );
    }

    #[test]
    fn test_format_cities() {
        let cities = vec![City::new("1219", "KOTA BANDUNG"), City::new("1301", "KOTA JAKARTA")];
        assert_eq!(
            format_cities(&cities),
            "  1219  KOTA BANDUNG\n  1301  KOTA JAKARTA\n"
        );
    }
}
