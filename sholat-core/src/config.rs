use crate::announcement::DEFAULT_ANNOUNCE_WINDOW;
use crate::error::{CoreError, Result};
use const_format::concatcp;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default base URL of the myquran API
pub const DEFAULT_API_BASE_URL: &str = "https://api.myquran.com/v2";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SholatConfig {
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub announcement: AnnouncementConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationConfig {
    /// City ID as listed by `sholat cities`
    #[serde(default)]
    pub city_id: String,
    /// Display name, informational only
    #[serde(default)]
    pub city_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementConfig {
    /// How long an adzan is considered in progress
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Adzan recording to play; no audio when unset
    #[serde(default)]
    pub audio_file: Option<PathBuf>,
    /// Playback volume, 0-100
    #[serde(default = "default_volume")]
    pub volume: u8,
}

const DEFAULT_WINDOW_SECS: u64 = DEFAULT_ANNOUNCE_WINDOW.as_secs();

const fn default_window_secs() -> u64 {
    DEFAULT_WINDOW_SECS
}

const fn default_volume() -> u8 {
    80
}

impl AnnouncementConfig {
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            audio_file: None,
            volume: default_volume(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_max_retries() -> u32 {
    3
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to ~/.config/sholat/sholat.log
    #[serde(default)]
    pub enabled: bool,
}

impl SholatConfig {
    /// Get the config file path (~/.config/sholat/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from the default location, or write a template on first run.
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` after creating the template, or an error if the
    /// file cannot be read, parsed, or validated.
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_at(&Self::config_path())
    }

    /// Load config from `path`, or write a template there on first run.
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` after creating the template, or an error if the
    /// file cannot be read, parsed, or validated.
    pub fn load_or_create_at(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, CONFIG_TEMPLATE)?;

            return Err(CoreError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate config file contents.
    ///
    /// # Errors
    ///
    /// Returns an error on TOML syntax errors or invalid values.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` describing the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.announcement.window_secs == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "announcement.window_secs must be greater than 0".to_string(),
            });
        }
        if self.announcement.volume > 100 {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "announcement.volume must be between 0 and 100, got {}",
                    self.announcement.volume
                ),
            });
        }
        if self.api.base_url.trim().is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "api.base_url".to_string(),
            });
        }
        Ok(())
    }

    /// City ID to use, preferring an explicit override.
    ///
    /// # Errors
    ///
    /// Returns `ConfigMissingField` when neither the override nor
    /// `location.city_id` is set.
    pub fn city_id<'a>(&'a self, override_id: Option<&'a str>) -> Result<&'a str> {
        let id = override_id.unwrap_or(&self.location.city_id).trim();
        if id.is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "location.city_id".to_string(),
            });
        }
        Ok(id)
    }
}

const CONFIG_TEMPLATE: &str = concatcp!(
    r#"# Sholat Configuration
# ~/.config/sholat/config.toml

[location]
# Find your city ID with: sholat cities <name>
city_id = ""
# city_name = "KOTA BANDUNG"

[announcement]
# Seconds an adzan stays "in progress" after the prayer time arrives
window_secs = "#,
    DEFAULT_WINDOW_SECS,
    r#"
# Path to an adzan recording (mp3/wav/ogg). Leave unset for a terminal bell.
# audio_file = "/home/me/adzan.mp3"
volume = 80

[api]
base_url = ""#,
    DEFAULT_API_BASE_URL,
    r#""
timeout_secs = 10
max_retries = 3

[logging]
# Also write logs to ~/.config/sholat/sholat.log
enabled = false
"#
);
