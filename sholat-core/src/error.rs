use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template has been created - please set your city and restart.")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Missing required config field: {field}")]
    ConfigMissingField { field: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Schedule errors
    #[error("Invalid prayer time {value:?}, expected HH:MM")]
    InvalidPrayerTime { value: String },

    #[error("Unknown prayer name: {name}")]
    UnknownPrayer { name: String },

    #[error("No prayer schedule available for city {city_id}")]
    ScheduleUnavailable { city_id: String },

    // Persistence errors
    #[error("State store error: {reason}")]
    StorageError { reason: String },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // Network errors
    #[error("Network request failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Network request failed: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),

    #[error("Provider {provider} returned an unusable response from {endpoint}: {reason}")]
    ApiResponse {
        provider: String,
        endpoint: String,
        reason: String,
    },

    // Audio errors
    #[error("Audio playback failed: {reason}")]
    AudioError { reason: String },

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
