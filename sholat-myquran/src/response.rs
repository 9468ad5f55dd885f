//! Wire types of the myquran v2 API.
//!
//! The API is loose with types: IDs and verse numbers arrive as either JSON
//! strings or numbers depending on the endpoint, so those fields go through
//! [`string_or_number`].

use serde::{Deserialize, Deserializer};

/// Common `{status, message, data}` envelope
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub status: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CityResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub lokasi: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScheduleResponse {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub lokasi: Option<String>,
    #[serde(default)]
    pub daerah: Option<String>,
    pub jadwal: Option<JadwalResponse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JadwalResponse {
    #[serde(default)]
    pub tanggal: Option<String>,
    /// ISO date (`yyyy-mm-dd`)
    #[serde(default)]
    pub date: Option<String>,
    pub imsak: Option<String>,
    pub subuh: Option<String>,
    pub terbit: Option<String>,
    pub dhuha: Option<String>,
    pub dzuhur: Option<String>,
    pub ashar: Option<String>,
    pub maghrib: Option<String>,
    pub isya: Option<String>,
}

impl JadwalResponse {
    /// `(name, time)` pairs of the prayers tracked by the countdown
    pub fn prayer_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("subuh", &self.subuh),
            ("dhuha", &self.dhuha),
            ("dzuhur", &self.dzuhur),
            ("ashar", &self.ashar),
            ("maghrib", &self.maghrib),
            ("isya", &self.isya),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
        .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RandomAyatResponse {
    pub info: Option<AyatInfo>,
    pub ayat: Option<AyatBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AyatInfo {
    pub surat: Option<SuratInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuratInfo {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub nama: Option<SuratName>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuratName {
    /// Latin name
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AyatBody {
    pub arab: Option<String>,
    pub text: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub ayah: Option<String>,
}

/// The hadith endpoint is not wrapped in [`Envelope`]; `info` sits beside `data`.
#[derive(Debug, Deserialize)]
pub(crate) struct HadithResponse {
    pub status: bool,
    pub info: Option<HadithInfo>,
    pub data: Option<HadithBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HadithInfo {
    pub perawi: Option<Perawi>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Perawi {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HadithBody {
    #[serde(deserialize_with = "string_or_number")]
    pub number: String,
    pub arab: String,
    pub id: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(u64),
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(|v| match v {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    }))
}
