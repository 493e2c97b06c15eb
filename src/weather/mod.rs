//! Weather Model
//!
//! Normalized weather data shared by every provider: the current
//! conditions snapshot and the forecast timeline attached to it.

pub mod conditions;
pub mod timeline;

use chrono::{DateTime, Utc};

use crate::providers::ProviderId;
use crate::units::Formatter;

// Re-export main types
pub use timeline::{correct_sun_times, ForecastSlot, ForecastTimeline, PartOfDay, TimelineError};

/// Conditions at one point in time.
///
/// Numeric fields are `None` when the provider did not report them.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditions {
    /// Air temperature in °C
    pub temperature: Option<f64>,
    /// Apparent temperature in °C
    pub feels_like: Option<f64>,
    /// Relative humidity in percent
    pub humidity: Option<f64>,
    /// Pressure in mbar (hPa)
    pub pressure: Option<f64>,
    /// Wind speed in m/s
    pub wind_speed: Option<f64>,
    /// Wind direction in degrees
    pub wind_direction: Option<f64>,
    /// Gust speed in m/s
    pub gust_speed: Option<f64>,
    /// Provider-specific condition code
    pub condition_code: Option<i32>,
    /// Condition text shown to the user
    pub condition: String,
    /// Symbolic icon name
    pub icon: String,
    /// Next sunrise
    pub sunrise: DateTime<Utc>,
    /// Next sunset
    pub sunset: DateTime<Utc>,
}

/// Whichever sun event the panel should show next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SunEvent {
    Sunrise(DateTime<Utc>),
    Sunset(DateTime<Utc>),
}

impl Conditions {
    /// Whether the provider reported gusts.
    pub fn gusts_available(&self) -> bool {
        self.gust_speed.is_some_and(f64::is_finite)
    }

    /// Whichever of sunrise and sunset comes first after `now`.
    ///
    /// When both already passed (stale data) the earlier one is returned.
    pub fn next_sun_event(&self, now: DateTime<Utc>) -> SunEvent {
        let rise_ahead = self.sunrise >= now;
        let set_ahead = self.sunset >= now;

        let sunset_first = match (rise_ahead, set_ahead) {
            (true, false) => false,
            (false, true) => true,
            _ => self.sunset < self.sunrise,
        };

        if sunset_first {
            SunEvent::Sunset(self.sunset)
        } else {
            SunEvent::Sunrise(self.sunrise)
        }
    }

    /// Temperature in the user's units.
    pub fn display_temperature(&self, fmt: &Formatter) -> String {
        fmt.temperature(self.temperature)
    }

    pub fn display_feels_like(&self, fmt: &Formatter) -> String {
        fmt.temperature(self.feels_like)
    }

    pub fn display_humidity(&self, fmt: &Formatter) -> String {
        fmt.humidity(self.humidity)
    }

    pub fn display_pressure(&self, fmt: &Formatter) -> String {
        fmt.pressure(self.pressure)
    }

    /// Wind with direction, e.g. `SW 12.6 km/h`.
    pub fn display_wind(&self, fmt: &Formatter) -> String {
        fmt.wind(self.wind_speed, self.wind_direction)
    }

    /// Gusts share the wind direction. `None` when gusts were not reported.
    pub fn display_gusts(&self, fmt: &Formatter) -> Option<String> {
        self.gusts_available()
            .then(|| fmt.wind(self.gust_speed, self.wind_direction))
    }
}

/// Result of one successful fetch: current conditions plus forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    /// Provider that produced the data
    pub provider: ProviderId,
    /// Current conditions
    pub current: Conditions,
    /// Forecast, absent when the provider returned none
    pub forecast: Option<ForecastTimeline>,
}

impl WeatherSnapshot {
    /// Whether a forecast is attached.
    pub fn has_forecast(&self) -> bool {
        self.forecast.is_some()
    }
}
