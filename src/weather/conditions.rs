//! Condition Catalog
//!
//! Provider condition codes to English condition text, and provider icon
//! keys to symbolic icon names.

use crate::providers::ProviderId;

/// Text used for codes the catalog does not know.
pub const NOT_AVAILABLE: &str = "Not available";

/// OpenWeatherMap condition code table.
fn openweathermap_condition(code: i32) -> Option<&'static str> {
    let text = match code {
        200 => "Thunderstorm with Light Rain",
        201 => "Thunderstorm with Rain",
        202 => "Thunderstorm with Heavy Rain",
        210 => "Light Thunderstorm",
        211 => "Thunderstorm",
        212 => "Heavy Thunderstorm",
        221 => "Ragged Thunderstorm",
        230 => "Thunderstorm with Light Drizzle",
        231 => "Thunderstorm with Drizzle",
        232 => "Thunderstorm with Heavy Drizzle",
        300 => "Light Drizzle",
        301 => "Drizzle",
        302 => "Heavy Drizzle",
        310 => "Light Drizzle Rain",
        311 => "Drizzle Rain",
        312 => "Heavy Drizzle Rain",
        313 => "Shower Rain and Drizzle",
        314 => "Heavy Rain and Drizzle",
        321 => "Shower Drizzle",
        500 => "Light Rain",
        501 => "Moderate Rain",
        502 => "Heavy Rain",
        503 => "Very Heavy Rain",
        504 => "Extreme Rain",
        511 => "Freezing Rain",
        520 => "Light Shower Rain",
        521 => "Shower Rain",
        522 => "Heavy Shower Rain",
        531 => "Ragged Shower Rain",
        600 => "Light Snow",
        601 => "Snow",
        602 => "Heavy Snow",
        611 => "Sleet",
        612 => "Light Shower Sleet",
        613 => "Shower Sleet",
        615 => "Light Rain and Snow",
        616 => "Rain and Snow",
        620 => "Light Shower Snow",
        621 => "Shower Snow",
        622 => "Heavy Shower Snow",
        701 => "Mist",
        711 => "Smoke",
        721 => "Haze",
        731 => "Sand/Dust Whirls",
        741 => "Fog",
        751 => "Sand",
        761 => "Dust",
        762 => "Volcanic Ash",
        771 => "Squalls",
        781 => "Tornado",
        800 => "Clear Sky",
        801 => "Few Clouds",
        802 => "Scattered Clouds",
        803 => "Broken Clouds",
        804 => "Overcast Clouds",
        _ => return None,
    };
    Some(text)
}

/// WMO weather interpretation codes, as used by Open-Meteo.
fn wmo_condition(code: i32) -> Option<&'static str> {
    let text = match code {
        0 => "Clear Sky",
        1 => "Mainly Clear",
        2 => "Partly Cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing Rime Fog",
        51 => "Light Drizzle",
        53 => "Moderate Drizzle",
        55 => "Dense Drizzle",
        56 => "Light Freezing Drizzle",
        57 => "Dense Freezing Drizzle",
        61 => "Slight Rain",
        63 => "Moderate Rain",
        65 => "Heavy Rain",
        66 => "Light Freezing Rain",
        67 => "Heavy Freezing Rain",
        71 => "Slight Snow Fall",
        73 => "Moderate Snow Fall",
        75 => "Heavy Snow Fall",
        77 => "Snow Grains",
        80 => "Slight Rain Showers",
        81 => "Moderate Rain Showers",
        82 => "Violent Rain Showers",
        85 => "Slight Snow Showers",
        86 => "Heavy Snow Showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with Slight Hail",
        99 => "Thunderstorm with Heavy Hail",
        _ => return None,
    };
    Some(text)
}

/// Canonical English condition text for a provider code.
pub fn condition_text(provider: ProviderId, code: i32) -> &'static str {
    let text = match provider {
        ProviderId::OpenWeatherMap => openweathermap_condition(code),
        ProviderId::OpenMeteo => wmo_condition(code),
    };
    text.unwrap_or(NOT_AVAILABLE)
}

/// Map a WMO code to the equivalent OpenWeatherMap icon key (`01d`, `10n`...).
pub fn wmo_icon_key(code: i32, is_day: bool) -> String {
    let base = match code {
        0 => "01",
        1 => "02",
        2 => "03",
        3 => "04",
        45 | 48 => "50",
        51..=57 | 80..=82 => "09",
        61..=67 => "10",
        71..=77 | 85 | 86 => "13",
        95..=99 => "11",
        _ => "04",
    };
    format!("{}{}", base, if is_day { 'd' } else { 'n' })
}

/// Icon families shared by every provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconFamily {
    Clear,
    FewClouds,
    Overcast,
    ShowersScattered,
    Showers,
    Storm,
    Snow,
    Fog,
}

impl IconFamily {
    /// Family for an OpenWeatherMap style icon key. Unknown keys map to overcast.
    pub fn from_icon_key(key: &str) -> Self {
        match key.get(..2) {
            Some("01") => IconFamily::Clear,
            Some("02") | Some("03") => IconFamily::FewClouds,
            Some("04") => IconFamily::Overcast,
            Some("09") => IconFamily::ShowersScattered,
            Some("10") => IconFamily::Showers,
            Some("11") => IconFamily::Storm,
            Some("13") => IconFamily::Snow,
            Some("50") => IconFamily::Fog,
            _ => {
                tracing::debug!("Unknown icon key '{}'", key);
                IconFamily::Overcast
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            IconFamily::Clear => "clear",
            IconFamily::FewClouds => "few-clouds",
            IconFamily::Overcast => "overcast",
            IconFamily::ShowersScattered => "showers-scattered",
            IconFamily::Showers => "showers",
            IconFamily::Storm => "storm",
            IconFamily::Snow => "snow",
            IconFamily::Fog => "fog",
        }
    }

    /// Only clear sky and few clouds are drawn differently at night.
    pub fn has_night_variant(&self) -> bool {
        matches!(self, IconFamily::Clear | IconFamily::FewClouds)
    }

    /// Symbolic icon name, e.g. `weather-clear-night-symbolic`.
    pub fn icon_name(&self, is_night: bool) -> String {
        if is_night && self.has_night_variant() {
            format!("weather-{}-night-symbolic", self.name())
        } else {
            format!("weather-{}-symbolic", self.name())
        }
    }
}

/// Icon name for a provider icon key.
///
/// Both providers use OpenWeatherMap style keys (Open-Meteo codes are
/// translated with [`wmo_icon_key`] first).
pub fn icon_name(provider: ProviderId, icon_key: &str, is_night: bool) -> String {
    match provider {
        ProviderId::OpenWeatherMap | ProviderId::OpenMeteo => {
            IconFamily::from_icon_key(icon_key).icon_name(is_night)
        }
    }
}
