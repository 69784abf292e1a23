use std::path::Path;

use chrono::Duration;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "weather-analytics.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub openweather: OpenWeatherSettings,
    pub backfill: BackfillSettings,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenWeatherSettings {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Shape of the synthetic history: how far back it reaches, the spacing
/// between steps and the uniform jitter applied to values and timestamps.
#[derive(Debug, Clone, Deserialize)]
pub struct BackfillSettings {
    pub horizon_weeks: i64,
    pub step_minutes: i64,
    pub temperature_jitter: f64,
    pub time_jitter_secs: i64,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            horizon_weeks: 6,
            step_minutes: 60,
            temperature_jitter: 3.0,
            time_jitter_secs: 120,
        }
    }
}

impl BackfillSettings {
    pub fn horizon(&self) -> Duration {
        Duration::weeks(self.horizon_weeks)
    }

    pub fn step(&self) -> Duration {
        Duration::minutes(self.step_minutes)
    }

    /// Rejects settings the generator cannot walk: a step that does not move
    /// the cursor backwards, or a negative horizon or jitter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step_minutes <= 0 {
            return Err(ConfigError::Message(format!(
                "backfill.step_minutes must be positive, got {}",
                self.step_minutes
            )));
        }
        if self.horizon_weeks < 0 {
            return Err(ConfigError::Message(format!(
                "backfill.horizon_weeks must not be negative, got {}",
                self.horizon_weeks
            )));
        }
        if !(self.temperature_jitter >= 0.0 && self.temperature_jitter.is_finite()) {
            return Err(ConfigError::Message(format!(
                "backfill.temperature_jitter must be a non-negative number, got {}",
                self.temperature_jitter
            )));
        }
        if self.time_jitter_secs < 0 {
            return Err(ConfigError::Message(format!(
                "backfill.time_jitter_secs must not be negative, got {}",
                self.time_jitter_secs
            )));
        }
        Ok(())
    }

    /// Temperature jitter in hundredths of a degree.
    pub fn temperature_jitter_centi(&self) -> i64 {
        (self.temperature_jitter * 100.0).round() as i64
    }
}

impl Settings {
    /// Loads defaults, then the optional config file, then the environment.
    ///
    /// `WEATHER__DATABASE__URL` style variables override nested keys;
    /// `DATABASE_URL` and `OPENWEATHER_API_KEY` are accepted as well.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = BackfillSettings::default();
        let mut builder = Config::builder()
            .set_default("database.url", "")?
            .set_default("database.max_connections", 5)?
            .set_default("openweather.api_key", "")?
            .set_default("openweather.base_url", "https://api.openweathermap.org")?
            .set_default("openweather.timeout_secs", 5)?
            .set_default("backfill.horizon_weeks", defaults.horizon_weeks)?
            .set_default("backfill.step_minutes", defaults.step_minutes)?
            .set_default("backfill.temperature_jitter", defaults.temperature_jitter)?
            .set_default("backfill.time_jitter_secs", defaults.time_jitter_secs)?
            .set_default("log_level", "info")?;

        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix("WEATHER")
                .prefix_separator("__")
                .separator("__"),
        );

        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", url)?;
        }
        if let Ok(key) = std::env::var("OPENWEATHER_API_KEY") {
            builder = builder.set_override("openweather.api_key", key)?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.backfill.validate()?;
        Ok(settings)
    }
}
