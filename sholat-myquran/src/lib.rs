mod response;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use sholat_core::{
    City, CoreError, DailySchedule, Hadith, PrayerDataProvider, PrayerSchedule, PrayerTime, Verse,
    DEFAULT_API_BASE_URL,
};
use std::time::Duration;
use tracing::{debug, info, warn};

use response::{CityResponse, Envelope, HadithResponse, RandomAyatResponse, ScheduleResponse};

const LOG_TARGET: &str = "sholat::myquran";
const PROVIDER_NAME: &str = "myquran";

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 3;

/// myquran.com v2 API provider for prayer schedules, Quran verses and hadith
pub struct MyQuranProvider {
    client: ClientWithMiddleware,
    base_url: String,
}

impl MyQuranProvider {
    /// Create a provider against the public API with a 10-second timeout and 3 retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, CoreError> {
        Self::with_config(DEFAULT_API_BASE_URL, DEFAULT_TIMEOUT_SECS, DEFAULT_MAX_RETRIES)
    }

    /// Create a provider with a custom base URL, timeout and retry count.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_config(
        base_url: &str,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self, CoreError> {
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("Sholat/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CoreError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(target: LOG_TARGET, "GET {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            warn!(target: LOG_TARGET, "{} returned status: {}", path, response.status());
            return Err(api_error(
                path,
                format!("server returned status: {}", response.status()),
            ));
        }
        Ok(response.json().await?)
    }

    /// Unwrap an envelope, turning `status: false` or a missing payload into an error
    fn open_envelope<T>(path: &str, envelope: Envelope<T>) -> Result<T, CoreError> {
        if !envelope.status {
            let reason = envelope
                .message
                .unwrap_or_else(|| "request was not successful".to_string());
            return Err(api_error(path, reason));
        }
        envelope
            .data
            .ok_or_else(|| api_error(path, "response has no data".to_string()))
    }

    fn parse_cities(cities: Vec<CityResponse>) -> Vec<City> {
        cities
            .into_iter()
            .map(|c| City::new(c.id, c.lokasi))
            .collect()
    }

    fn parse_schedule(
        path: &str,
        city_id: &str,
        date: NaiveDate,
        response: ScheduleResponse,
    ) -> Result<DailySchedule, CoreError> {
        let Some(jadwal) = response.jadwal else {
            return Err(CoreError::ScheduleUnavailable {
                city_id: city_id.to_string(),
            });
        };
        let (Some(id), Some(location)) = (response.id, response.lokasi) else {
            return Err(api_error(path, "schedule is missing id or lokasi".to_string()));
        };

        let prayers = PrayerSchedule::from_pairs(jadwal.prayer_pairs());
        if prayers.is_empty() {
            return Err(api_error(path, "schedule has no usable prayer times".to_string()));
        }

        let reported_date = jadwal
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        if reported_date.is_some_and(|d| d != date) {
            warn!(
                target: LOG_TARGET,
                "Requested schedule for {} but received {:?}", date, reported_date
            );
        }

        Ok(DailySchedule {
            city_id: id,
            location,
            region: response.daerah.unwrap_or_default(),
            date,
            date_label: jadwal.tanggal.unwrap_or_else(|| date.to_string()),
            imsak: optional_time(jadwal.imsak.as_deref()),
            terbit: optional_time(jadwal.terbit.as_deref()),
            prayers,
        })
    }

    fn parse_verse(path: &str, response: RandomAyatResponse) -> Result<Verse, CoreError> {
        let surat = response.info.and_then(|i| i.surat);
        let surah_number = surat
            .as_ref()
            .and_then(|s| s.id.as_deref())
            .and_then(|id| id.parse().ok())
            .unwrap_or_default();
        let surah_name = surat.and_then(|s| s.nama).and_then(|n| n.id);

        let ayat = response.ayat;
        let arabic = ayat.as_ref().and_then(|a| a.arab.clone());
        let translation = ayat.as_ref().and_then(|a| a.text.clone());
        let ayah_number = ayat
            .as_ref()
            .and_then(|a| a.ayah.as_deref())
            .and_then(|n| n.trim().parse::<u32>().ok());

        match (surah_name, arabic, translation, ayah_number) {
            (Some(surah_name), Some(arabic), Some(translation), Some(ayah_number)) => Ok(Verse {
                surah_name,
                surah_number,
                ayah_number,
                arabic,
                translation,
            }),
            _ => Err(api_error(path, "verse is missing required fields".to_string())),
        }
    }

    fn parse_hadith(path: &str, response: HadithResponse) -> Result<Hadith, CoreError> {
        if !response.status {
            return Err(api_error(path, "request was not successful".to_string()));
        }
        let narrator = response
            .info
            .and_then(|i| i.perawi)
            .map(|p| p.name)
            .ok_or_else(|| api_error(path, "hadith has no narrator".to_string()))?;
        let data = response
            .data
            .ok_or_else(|| api_error(path, "response has no data".to_string()))?;
        let number = data
            .number
            .trim()
            .parse()
            .map_err(|_| api_error(path, format!("invalid hadith number: {}", data.number)))?;

        Ok(Hadith {
            narrator,
            number,
            arabic: data.arab,
            translation: data.id,
        })
    }
}

fn api_error(endpoint: &str, reason: String) -> CoreError {
    CoreError::ApiResponse {
        provider: PROVIDER_NAME.to_string(),
        endpoint: endpoint.to_string(),
        reason,
    }
}

/// Informational times are dropped when malformed
fn optional_time(value: Option<&str>) -> Option<PrayerTime> {
    let value = value?;
    match PrayerTime::parse(value) {
        Ok(time) => Some(time),
        Err(e) => {
            debug!(target: LOG_TARGET, "Ignoring {}", e);
            None
        }
    }
}

#[async_trait]
impl PrayerDataProvider for MyQuranProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn all_cities(&self) -> Result<Vec<City>, CoreError> {
        let path = "/sholat/kota/semua";
        let envelope: Envelope<Vec<CityResponse>> = self.get_json(path).await?;
        let cities = Self::parse_cities(Self::open_envelope(path, envelope)?);
        info!(target: LOG_TARGET, "Loaded {} cities", cities.len());
        Ok(cities)
    }

    async fn search_cities(&self, query: &str) -> Result<Vec<City>, CoreError> {
        let query = query.trim();
        if query.is_empty() {
            return self.all_cities().await;
        }

        let path = format!("/sholat/kota/cari/{}", urlencoding::encode(query));
        let envelope: Envelope<Vec<CityResponse>> = self.get_json(&path).await?;
        // status=false here means "no match", not a failure
        if !envelope.status {
            debug!(target: LOG_TARGET, "No cities match {:?}", query);
            return Ok(Vec::new());
        }
        Ok(Self::parse_cities(envelope.data.unwrap_or_default()))
    }

    async fn daily_schedule(
        &self,
        city_id: &str,
        date: NaiveDate,
    ) -> Result<DailySchedule, CoreError> {
        let path = format!(
            "/sholat/jadwal/{}/{}",
            urlencoding::encode(city_id.trim()),
            date.format("%Y-%m-%d")
        );
        let envelope: Envelope<ScheduleResponse> = self.get_json(&path).await?;
        if !envelope.status {
            warn!(
                target: LOG_TARGET,
                "No schedule for city {}: {}",
                city_id,
                envelope.message.as_deref().unwrap_or("unknown reason")
            );
            return Err(CoreError::ScheduleUnavailable {
                city_id: city_id.to_string(),
            });
        }
        let Some(data) = envelope.data else {
            return Err(CoreError::ScheduleUnavailable {
                city_id: city_id.to_string(),
            });
        };
        Self::parse_schedule(&path, city_id, date, data)
    }

    async fn random_verse(&self) -> Result<Verse, CoreError> {
        let path = "/quran/ayat/acak";
        let envelope: Envelope<RandomAyatResponse> = self.get_json(path).await?;
        Self::parse_verse(path, Self::open_envelope(path, envelope)?)
    }

    async fn random_hadith(&self) -> Result<Hadith, CoreError> {
        let path = "/hadits/perawi/acak";
        let response: HadithResponse = self.get_json(path).await?;
        Self::parse_hadith(path, response)
    }
}
