use crate::error::CoreError;
use crate::prayer::{PrayerSchedule, PrayerTime};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A city that has a published prayer schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    /// Provider-specific city ID
    pub id: String,
    /// Display name, e.g. "KOTA BANDUNG"
    pub name: String,
}

impl City {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Prayer schedule for one city on one date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedule {
    pub city_id: String,
    /// City name as reported by the provider
    pub location: String,
    /// Province or region
    pub region: String,
    pub date: NaiveDate,
    /// Human-readable date from the provider, e.g. "Minggu, 10/03/2024"
    pub date_label: String,
    /// Start of the pre-dawn fasting window (informational)
    pub imsak: Option<PrayerTime>,
    /// Sunrise (informational)
    pub terbit: Option<PrayerTime>,
    /// The prayers driving the countdown
    pub prayers: PrayerSchedule,
}

/// A single Quran verse with its translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verse {
    /// Surah name in Latin script
    pub surah_name: String,
    pub surah_number: u32,
    pub ayah_number: u32,
    pub arabic: String,
    pub translation: String,
}

/// A hadith from a named narrator collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hadith {
    pub narrator: String,
    pub number: u32,
    pub arabic: String,
    pub translation: String,
}

/// Trait for prayer schedule and reading providers
#[async_trait]
pub trait PrayerDataProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// List every city the provider knows
    async fn all_cities(&self) -> Result<Vec<City>, CoreError>;

    /// Find cities whose name contains `query`
    async fn search_cities(&self, query: &str) -> Result<Vec<City>, CoreError>;

    /// Fetch the prayer schedule of a city for a date
    async fn daily_schedule(&self, city_id: &str, date: NaiveDate) -> Result<DailySchedule, CoreError>;

    /// Fetch a random Quran verse
    async fn random_verse(&self) -> Result<Verse, CoreError>;

    /// Fetch a random hadith
    async fn random_hadith(&self) -> Result<Hadith, CoreError>;
}
