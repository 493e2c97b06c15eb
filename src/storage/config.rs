//! Indicator settings.
//!
//! Typed settings persisted as TOML in the platform data directory, and
//! the store the rest of the crate reads them through.

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::location::Coordinates;
use crate::providers::ProviderId;
use crate::units::{ClockFormat, NumberLocale, PressureUnit, TemperatureUnit, WindSpeedUnit};

/// Shortest allowed current-conditions refresh interval.
pub const MIN_CURRENT_INTERVAL_SECS: u64 = 600;

/// Shortest allowed forecast refresh interval.
pub const MIN_FORECAST_INTERVAL_SECS: u64 = 3600;

/// Which provider to fetch from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSelection {
    /// Pick a usable provider and rotate on rate limits
    #[default]
    Automatic,
    OpenWeatherMap,
    OpenMeteo,
}

impl ProviderSelection {
    /// The explicitly selected provider, if any.
    pub fn fixed(&self) -> Option<ProviderId> {
        match self {
            ProviderSelection::Automatic => None,
            ProviderSelection::OpenWeatherMap => Some(ProviderId::OpenWeatherMap),
            ProviderSelection::OpenMeteo => Some(ProviderId::OpenMeteo),
        }
    }
}

impl std::fmt::Display for ProviderSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.fixed() {
            Some(id) => write!(f, "{}", id),
            None => write!(f, "Automatic"),
        }
    }
}

/// A saved location. No coordinates means "my location".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEntry {
    /// Display name
    pub name: String,
    /// Fixed coordinates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

impl LocationEntry {
    pub fn new(name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            name: name.into(),
            coordinates: Some(coordinates),
        }
    }

    /// Entry resolved by IP geolocation.
    pub fn my_location() -> Self {
        Self {
            name: "My Location".to_string(),
            coordinates: None,
        }
    }

    pub fn is_my_location(&self) -> bool {
        self.coordinates.is_none()
    }
}

/// All indicator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    /// Temperature unit
    pub unit: TemperatureUnit,
    /// Pressure unit
    pub pressure_unit: PressureUnit,
    /// Wind speed unit
    pub wind_speed_unit: WindSpeedUnit,
    /// Clock format for sun and forecast times
    pub clock_format: ClockFormat,
    /// Fractional digits for temperatures
    pub decimal_places: u8,
    /// Fractional digits for pressure; unset picks a default for the unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure_decimal_places: Option<u8>,
    /// Fractional digits for wind speed; unset follows `decimal_places`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_decimal_places: Option<u8>,
    /// Arrows instead of compass letters
    pub wind_direction_arrows: bool,
    /// Current conditions refresh interval in seconds
    pub refresh_interval_current: u64,
    /// Forecast refresh interval in seconds
    pub refresh_interval_forecast: u64,
    /// Forecast days after today
    pub forecast_days: u32,
    pub disable_forecast: bool,
    /// Use the local condition catalog instead of provider text
    pub translate_condition: bool,
    /// Ask the provider for localized text
    pub provider_translations: bool,
    pub provider: ProviderSelection,
    /// OpenWeatherMap API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Index into `locations`
    pub selected_location: usize,
    /// How long an IP location lookup stays valid
    pub location_refresh_interval_minutes: f64,
    /// Locale override, e.g. `de-DE`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Delay before the first fetch
    pub startup_delay_secs: u64,
    /// Suppresses reactions to changes while set
    pub frozen: bool,
    /// Saved locations (must stay the last field for TOML output)
    pub locations: Vec<LocationEntry>,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            unit: TemperatureUnit::Celsius,
            pressure_unit: PressureUnit::Hpa,
            wind_speed_unit: WindSpeedUnit::Kph,
            clock_format: ClockFormat::System,
            decimal_places: 1,
            pressure_decimal_places: None,
            speed_decimal_places: None,
            wind_direction_arrows: false,
            refresh_interval_current: MIN_CURRENT_INTERVAL_SECS,
            refresh_interval_forecast: MIN_FORECAST_INTERVAL_SECS,
            forecast_days: 2,
            disable_forecast: false,
            translate_condition: true,
            provider_translations: false,
            provider: ProviderSelection::Automatic,
            api_key: None,
            selected_location: 0,
            location_refresh_interval_minutes: 15.0,
            locale: None,
            startup_delay_secs: 0,
            frozen: false,
            locations: Vec::new(),
        }
    }
}

/// What a settings change requires from the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettingsChange {
    /// Cached data no longer matches the settings
    pub refetch: bool,
    /// Refresh intervals changed
    pub reschedule: bool,
    /// Only presentation changed
    pub display: bool,
}

impl SettingsChange {
    pub fn is_empty(&self) -> bool {
        !self.refetch && !self.reschedule && !self.display
    }
}

impl IndicatorSettings {
    /// Selected location; an out-of-range index selects the first entry.
    pub fn active_location(&self) -> Option<&LocationEntry> {
        self.locations
            .get(self.selected_location)
            .or_else(|| self.locations.first())
    }

    /// Current-conditions interval, never below ten minutes.
    pub fn current_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_current.max(MIN_CURRENT_INTERVAL_SECS))
    }

    /// Forecast interval, never below one hour.
    pub fn forecast_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_forecast.max(MIN_FORECAST_INTERVAL_SECS))
    }

    pub fn forecast_enabled(&self) -> bool {
        !self.disable_forecast
    }

    /// Age after which cached data counts as stale.
    pub fn max_cache_age(&self) -> Duration {
        if self.forecast_enabled() {
            self.current_interval().min(self.forecast_interval())
        } else {
            self.current_interval()
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn location_refresh_interval(&self) -> Duration {
        let minutes = if self.location_refresh_interval_minutes.is_finite() {
            self.location_refresh_interval_minutes.max(0.0)
        } else {
            0.0
        };
        Duration::from_secs_f64(minutes * 60.0)
    }

    pub fn pressure_decimals(&self) -> u8 {
        self.pressure_decimal_places
            .unwrap_or_else(|| self.pressure_unit.default_decimals())
    }

    pub fn speed_decimals(&self) -> u8 {
        self.speed_decimal_places.unwrap_or(self.decimal_places)
    }

    /// Locale override, or the system locale.
    pub fn number_locale(&self) -> NumberLocale {
        match self.locale.as_deref() {
            Some(tag) => NumberLocale::from_tag(tag),
            None => NumberLocale::system(),
        }
    }

    /// Classify the differences between `self` and `new`.
    pub fn diff(&self, new: &IndicatorSettings) -> SettingsChange {
        let location_changed = self.active_location() != new.active_location();
        let forecast_reenabled = self.disable_forecast && !new.disable_forecast;
        let language_changed = new.provider_translations && self.locale != new.locale;

        let refetch = location_changed
            || self.provider != new.provider
            || self.forecast_days != new.forecast_days
            || self.provider_translations != new.provider_translations
            || self.translate_condition != new.translate_condition
            || forecast_reenabled
            || self.api_key != new.api_key
            || language_changed;

        let reschedule = self.current_interval() != new.current_interval()
            || self.forecast_interval() != new.forecast_interval();

        let display = self.unit != new.unit
            || self.pressure_unit != new.pressure_unit
            || self.wind_speed_unit != new.wind_speed_unit
            || self.clock_format != new.clock_format
            || self.decimal_places != new.decimal_places
            || self.pressure_decimal_places != new.pressure_decimal_places
            || self.speed_decimal_places != new.speed_decimal_places
            || self.wind_direction_arrows != new.wind_direction_arrows
            || self.disable_forecast != new.disable_forecast
            || self.locale != new.locale
            || self.locations != new.locations;

        SettingsChange {
            refetch,
            reschedule,
            display,
        }
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "weather-indicator", "WeatherIndicator")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load settings from `path`, using defaults when the file does not exist.
pub fn load_settings_from(path: &Path) -> Result<IndicatorSettings, ConfigError> {
    if !path.exists() {
        return Ok(IndicatorSettings::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Save settings to `path`.
pub fn save_settings_to(path: &Path, settings: &IndicatorSettings) -> Result<(), ConfigError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(settings).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Shared settings, optionally backed by a file.
///
/// Reads hand out snapshots; writes go through [`SettingsStore::update`]
/// and are persisted immediately.
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    settings: RwLock<IndicatorSettings>,
}

impl SettingsStore {
    /// Store that never touches the filesystem.
    pub fn in_memory(settings: IndicatorSettings) -> Self {
        Self {
            path: None,
            settings: RwLock::new(settings),
        }
    }

    /// Store backed by the TOML file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let settings = load_settings_from(&path)?;
        Ok(Self {
            path: Some(path),
            settings: RwLock::new(settings),
        })
    }

    /// Store backed by the default configuration file.
    pub fn open_default() -> Result<Self, ConfigError> {
        Self::open(get_config_path())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> IndicatorSettings {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Modify settings and persist them. Returns the new settings.
    pub fn update<F>(&self, apply: F) -> Result<IndicatorSettings, ConfigError>
    where
        F: FnOnce(&mut IndicatorSettings),
    {
        let updated = {
            let mut settings = self.settings.write().unwrap_or_else(|e| e.into_inner());
            apply(&mut settings);
            settings.clone()
        };

        if let Some(path) = &self.path {
            save_settings_to(path, &updated)?;
        }
        Ok(updated)
    }

    /// Write back a corrected forecast day count.
    pub fn set_forecast_days(&self, days: u32) -> Result<(), ConfigError> {
        self.update(|s| s.forecast_days = days).map(|_| ())
    }

    /// Re-read the backing file, keeping in-memory settings for stores
    /// without one.
    pub fn reload(&self) -> Result<IndicatorSettings, ConfigError> {
        let Some(path) = &self.path else {
            return Ok(self.snapshot());
        };

        let loaded = load_settings_from(path)?;
        *self.settings.write().unwrap_or_else(|e| e.into_inner()) = loaded.clone();
        Ok(loaded)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
