//! Unit Conversion
//!
//! Converts provider values (always Celsius, millibar and metres per second)
//! into the user's display units and formats them for the panel.

pub mod locale;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::storage::config::IndicatorSettings;

// Re-export main types
pub use locale::NumberLocale;

/// Placeholder shown for values the provider did not report.
pub const UNAVAILABLE: &str = "\u{2013}";

/// Temperature display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
    Kelvin,
    Rankine,
    Reaumur,
    Roemer,
    Delisle,
    Newton,
}

impl TemperatureUnit {
    /// Convert from degrees Celsius.
    pub fn from_celsius(&self, c: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => c,
            TemperatureUnit::Fahrenheit => c * 1.8 + 32.0,
            TemperatureUnit::Kelvin => c + 273.15,
            TemperatureUnit::Rankine => c * 1.8 + 491.67,
            TemperatureUnit::Reaumur => c * 0.8,
            TemperatureUnit::Roemer => c * 21.0 / 40.0 + 7.5,
            TemperatureUnit::Delisle => (100.0 - c) * 1.5,
            TemperatureUnit::Newton => c - 0.33,
        }
    }

    /// Unit symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "\u{00B0}C",
            TemperatureUnit::Fahrenheit => "\u{00B0}F",
            TemperatureUnit::Kelvin => "K",
            TemperatureUnit::Rankine => "\u{00B0}Ra",
            TemperatureUnit::Reaumur => "\u{00B0}R\u{00E9}",
            TemperatureUnit::Roemer => "\u{00B0}R\u{00F8}",
            TemperatureUnit::Delisle => "\u{00B0}De",
            TemperatureUnit::Newton => "\u{00B0}N",
        }
    }
}

/// Pressure display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureUnit {
    #[default]
    Hpa,
    InHg,
    Bar,
    Pa,
    Kpa,
    Atm,
    At,
    Torr,
    Psi,
    MmHg,
    Mbar,
}

impl PressureUnit {
    /// Convert from millibar (numerically equal to hPa).
    pub fn from_mbar(&self, p: f64) -> f64 {
        match self {
            PressureUnit::Hpa | PressureUnit::Mbar => p,
            PressureUnit::InHg => p / 33.86530749,
            PressureUnit::Bar => p / 1000.0,
            PressureUnit::Pa => p * 100.0,
            PressureUnit::Kpa => p / 10.0,
            PressureUnit::Atm => p * 0.000986923267,
            PressureUnit::At => p * 0.00101971621,
            PressureUnit::Torr => p * 0.750061683,
            PressureUnit::Psi => p * 0.0145037738,
            PressureUnit::MmHg => p * 0.750061683,
        }
    }

    /// Fractional digits that suit the unit's magnitude.
    pub fn default_decimals(&self) -> u8 {
        match self {
            PressureUnit::Mbar | PressureUnit::Pa => 0,
            PressureUnit::Hpa | PressureUnit::Kpa | PressureUnit::MmHg | PressureUnit::Torr => 1,
            PressureUnit::InHg | PressureUnit::Psi => 2,
            PressureUnit::Atm | PressureUnit::At | PressureUnit::Bar => 3,
        }
    }

    /// Unit label.
    pub fn label(&self) -> &'static str {
        match self {
            PressureUnit::Hpa => "hPa",
            PressureUnit::InHg => "inHg",
            PressureUnit::Bar => "bar",
            PressureUnit::Pa => "Pa",
            PressureUnit::Kpa => "kPa",
            PressureUnit::Atm => "atm",
            PressureUnit::At => "at",
            PressureUnit::Torr => "Torr",
            PressureUnit::Psi => "psi",
            PressureUnit::MmHg => "mmHg",
            PressureUnit::Mbar => "mbar",
        }
    }
}

/// Wind speed display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindSpeedUnit {
    #[default]
    Kph,
    Mph,
    Mps,
    Knots,
    Fps,
    Beaufort,
}

impl WindSpeedUnit {
    /// Convert from metres per second. Beaufort yields the force number.
    pub fn from_mps(&self, s: f64) -> f64 {
        match self {
            WindSpeedUnit::Kph => s * 3.6,
            WindSpeedUnit::Mph => s * 2.23693629,
            WindSpeedUnit::Mps => s,
            WindSpeedUnit::Knots => s * 1.94384449,
            WindSpeedUnit::Fps => s * 3.2808399,
            WindSpeedUnit::Beaufort => f64::from(beaufort(s).force),
        }
    }

    /// Unit label (empty for Beaufort, which renders a name instead).
    pub fn label(&self) -> &'static str {
        match self {
            WindSpeedUnit::Kph => "km/h",
            WindSpeedUnit::Mph => "mph",
            WindSpeedUnit::Mps => "m/s",
            WindSpeedUnit::Knots => "kn",
            WindSpeedUnit::Fps => "ft/s",
            WindSpeedUnit::Beaufort => "",
        }
    }
}

/// How wind direction is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindDirectionStyle {
    /// N, NE, E, ...
    #[default]
    Letters,
    /// Arrow glyphs pointing where the wind blows to
    Arrows,
}

/// Clock format for forecast and sun times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockFormat {
    /// 24-hour clock
    #[serde(rename = "24h")]
    TwentyFourHour,
    /// 12-hour clock with AM/PM
    #[serde(rename = "12h")]
    TwelveHour,
    /// Follow the desktop; resolves to 24-hour here
    #[default]
    System,
}

/// A Beaufort scale bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaufortForce {
    /// Force number (0-12)
    pub force: u8,
    /// Descriptive name
    pub name: &'static str,
}

/// Upper bound (inclusive, m/s) of each force below hurricane.
const BEAUFORT_SCALE: [(f64, &str); 12] = [
    (0.3, "Calm"),
    (1.5, "Light air"),
    (3.4, "Light breeze"),
    (5.4, "Gentle breeze"),
    (7.9, "Moderate breeze"),
    (10.7, "Fresh breeze"),
    (13.8, "Strong breeze"),
    (17.1, "Moderate gale"),
    (20.7, "Fresh gale"),
    (24.4, "Strong gale"),
    (28.4, "Storm"),
    (32.6, "Violent storm"),
];

/// Classify a wind speed in m/s on the Beaufort scale.
pub fn beaufort(mps: f64) -> BeaufortForce {
    // Force 0 is strictly below 0.3 m/s, every other bound is inclusive
    if mps < BEAUFORT_SCALE[0].0 {
        return BeaufortForce {
            force: 0,
            name: BEAUFORT_SCALE[0].1,
        };
    }

    for (force, (upper, name)) in BEAUFORT_SCALE.iter().enumerate().skip(1) {
        if mps <= *upper {
            return BeaufortForce {
                force: force as u8,
                name: *name,
            };
        }
    }

    BeaufortForce {
        force: 12,
        name: "Hurricane",
    }
}

fn available(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Format a Celsius temperature in `unit`, e.g. `32.0 °F`.
pub fn format_temperature(
    celsius: Option<f64>,
    unit: TemperatureUnit,
    decimals: u8,
    locale: &NumberLocale,
) -> String {
    match available(celsius) {
        Some(c) => format!(
            "{} {}",
            locale.format(unit.from_celsius(c), decimals),
            unit.symbol()
        ),
        None => UNAVAILABLE.to_string(),
    }
}

/// Format a millibar pressure in `unit`, e.g. `29.92 inHg`.
pub fn format_pressure(
    mbar: Option<f64>,
    unit: PressureUnit,
    decimals: u8,
    locale: &NumberLocale,
) -> String {
    match available(mbar) {
        Some(p) => format!("{} {}", locale.format(unit.from_mbar(p), decimals), unit.label()),
        None => UNAVAILABLE.to_string(),
    }
}

/// Format a wind speed, e.g. `12.6 km/h` or `4 (Moderate breeze)`.
pub fn format_wind_speed(
    mps: Option<f64>,
    unit: WindSpeedUnit,
    decimals: u8,
    locale: &NumberLocale,
) -> String {
    let Some(s) = available(mps) else {
        return UNAVAILABLE.to_string();
    };

    match unit {
        WindSpeedUnit::Beaufort => {
            let b = beaufort(s);
            format!("{} ({})", b.force, b.name)
        }
        _ => format!("{} {}", locale.format(unit.from_mps(s), decimals), unit.label()),
    }
}

/// Compass index 0..8 (N, NE, E, ...) for a direction in degrees.
pub fn compass_index(degrees: f64) -> usize {
    ((degrees / 45.0).round() as i64).rem_euclid(8) as usize
}

/// Render a wind direction in degrees as an arrow or compass letters.
pub fn format_wind_direction(degrees: Option<f64>, style: WindDirectionStyle) -> &'static str {
    const ARROWS: [&str; 8] = [
        "\u{2193}", "\u{2199}", "\u{2190}", "\u{2196}", "\u{2191}", "\u{2197}", "\u{2192}", "\u{2198}",
    ];
    const LETTERS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

    let Some(deg) = available(degrees) else {
        return UNAVAILABLE;
    };

    let idx = compass_index(deg);
    match style {
        WindDirectionStyle::Arrows => ARROWS[idx],
        WindDirectionStyle::Letters => LETTERS[idx],
    }
}

/// Direction followed by speed, e.g. `SW 12.6 km/h`.
///
/// Beaufort output and winds without a reported direction omit the
/// direction part.
pub fn format_wind(
    mps: Option<f64>,
    degrees: Option<f64>,
    unit: WindSpeedUnit,
    decimals: u8,
    style: WindDirectionStyle,
    locale: &NumberLocale,
) -> String {
    let speed = format_wind_speed(mps, unit, decimals, locale);
    if available(mps).is_none() || unit == WindSpeedUnit::Beaufort || available(degrees).is_none() {
        return speed;
    }

    format!("{} {}", format_wind_direction(degrees, style), speed)
}

/// Format a clock time.
pub fn format_time<Tz: TimeZone>(time: &DateTime<Tz>, clock: ClockFormat) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match clock {
        ClockFormat::TwelveHour => time.format("%-I:%M %p").to_string(),
        ClockFormat::TwentyFourHour | ClockFormat::System => time.format("%H:%M").to_string(),
    }
}

/// Display formatter bound to the user's unit settings and locale.
#[derive(Debug, Clone)]
pub struct Formatter {
    temperature: TemperatureUnit,
    pressure: PressureUnit,
    wind_speed: WindSpeedUnit,
    wind_direction: WindDirectionStyle,
    clock: ClockFormat,
    decimals: u8,
    pressure_decimals: u8,
    speed_decimals: u8,
    locale: NumberLocale,
}

impl Formatter {
    /// Create a formatter from settings.
    pub fn new(settings: &IndicatorSettings, locale: NumberLocale) -> Self {
        Self {
            temperature: settings.unit,
            pressure: settings.pressure_unit,
            wind_speed: settings.wind_speed_unit,
            wind_direction: if settings.wind_direction_arrows {
                WindDirectionStyle::Arrows
            } else {
                WindDirectionStyle::Letters
            },
            clock: settings.clock_format,
            decimals: settings.decimal_places,
            pressure_decimals: settings.pressure_decimals(),
            speed_decimals: settings.speed_decimals(),
            locale,
        }
    }

    /// Temperature with unit symbol, e.g. `21.5 °C`.
    pub fn temperature(&self, celsius: Option<f64>) -> String {
        format_temperature(celsius, self.temperature, self.decimals, &self.locale)
    }

    /// Pressure with unit label, using the unit's own precision unless
    /// overridden.
    pub fn pressure(&self, mbar: Option<f64>) -> String {
        format_pressure(mbar, self.pressure, self.pressure_decimals, &self.locale)
    }

    /// Relative humidity as a whole percentage.
    pub fn humidity(&self, percent: Option<f64>) -> String {
        match available(percent) {
            Some(h) => format!("{}%", self.locale.format(h, 0)),
            None => UNAVAILABLE.to_string(),
        }
    }

    /// Direction followed by speed. Beaufort, or a missing direction,
    /// shows the speed alone.
    pub fn wind(&self, mps: Option<f64>, degrees: Option<f64>) -> String {
        format_wind(
            mps,
            degrees,
            self.wind_speed,
            self.speed_decimals,
            self.wind_direction,
            &self.locale,
        )
    }

    /// Clock time in the configured format.
    pub fn time<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        format_time(time, self.clock)
    }
}
