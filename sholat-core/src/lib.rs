pub mod announcement;
pub mod audio;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod label;
pub mod paths;
pub mod prayer;
pub mod provider;
pub mod storage;
pub mod time;

pub use announcement::{
    AnnouncementState, AnnouncementStore, LastAnnouncement, DEFAULT_ANNOUNCE_WINDOW,
    LAST_ANNOUNCEMENT_KEY,
};
pub use audio::{AudioSink, NullAudioSink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AnnouncementConfig, ApiConfig, LocationConfig, LoggingConfig, SholatConfig,
    DEFAULT_API_BASE_URL,
};
pub use countdown::{next_prayer, CountdownView, PrayerClock, UpcomingPrayer};
pub use engine::{ClockEvent, CountdownEngine};
pub use error::{CoreError, Result};
pub use fetcher::ScheduleFetcher;
pub use paths::{
    config_dir, config_path, log_file_path, state_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME,
    LOG_FILE_NAME, STATE_FILE_NAME,
};
pub use prayer::{Prayer, PrayerSchedule, PrayerTime};
pub use provider::{City, DailySchedule, Hadith, PrayerDataProvider, Verse};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use time::DurationExt;
