//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! Telegram API retry constants.

use crate::relay::DeliveryTarget;
use chrono::{FixedOffset, Offset, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default send interval: 3 hours
pub const DEFAULT_MEDIA_INTERVAL_MS: u64 = 10_800_000;
/// Default folder for downloaded media
pub const DEFAULT_MEDIA_FOLDER: &str = "./media";

/// Maximum attempts for a Telegram API call (send, edit, download)
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff between Telegram API attempts
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for the backoff between Telegram API attempts
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

/// Errors raised while loading settings
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Source could not be read or deserialized
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// A value is present but unusable
    #[error("Invalid setting `{key}`: {reason}")]
    Invalid {
        /// Offending key
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub bot_token: String,

    /// Channel receiving all media; unset sends media back to the submitter
    pub target_channel_id: Option<String>,

    /// Minimum spacing between sends, in milliseconds
    #[serde(default = "default_media_interval")]
    pub media_interval: u64,

    /// Folder for downloaded media
    #[serde(default = "default_media_folder")]
    pub media_folder: String,

    /// Offset applied to times shown to users
    #[serde(default)]
    pub display_utc_offset_minutes: i32,
}

const fn default_media_interval() -> u64 {
    DEFAULT_MEDIA_INTERVAL_MS
}

fn default_media_folder() -> String {
    DEFAULT_MEDIA_FOLDER.to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_relay_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `SettingsError` if loading fails or a value is invalid.
    pub fn new() -> Result<Self, SettingsError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP__MEDIA_INTERVAL=60000 ./target/app`
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Plain variables: BOT_TOKEN -> bot_token; empty values count as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let settings: Self = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks values the type system cannot
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Invalid` for the first bad value.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.bot_token.trim().is_empty() {
            return Err(SettingsError::Invalid {
                key: "bot_token",
                reason: "must not be empty".to_string(),
            });
        }
        if self.media_interval == 0 {
            return Err(SettingsError::Invalid {
                key: "media_interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.media_folder.trim().is_empty() {
            return Err(SettingsError::Invalid {
                key: "media_folder",
                reason: "must not be empty".to_string(),
            });
        }
        if self.display_utc_offset_minutes.abs() >= 24 * 60 {
            return Err(SettingsError::Invalid {
                key: "display_utc_offset_minutes",
                reason: format!("{} is out of range", self.display_utc_offset_minutes),
            });
        }
        Ok(())
    }

    /// Send interval as a `Duration`
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.media_interval)
    }

    /// Parsed broadcast destination
    #[must_use]
    pub fn destination(&self) -> Option<DeliveryTarget> {
        self.target_channel_id
            .as_deref()
            .and_then(DeliveryTarget::parse)
    }

    /// Download folder
    #[must_use]
    pub fn media_folder(&self) -> PathBuf {
        PathBuf::from(&self.media_folder)
    }

    /// Offset for displayed times; falls back to UTC
    #[must_use]
    pub fn display_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.display_utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}
