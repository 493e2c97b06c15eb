//! Open-Meteo Provider
//!
//! Keyless provider using WMO weather codes. Current conditions, hourly
//! forecast and daily sun times come from a single request; hourly values
//! are grouped into 3 hour slots to match the other provider.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;

use super::http::HttpTransport;
use super::{FetchError, FetchRequest, ProviderId, ProviderInfo, WeatherProvider};
use crate::weather::conditions;
use crate::weather::{Conditions, ForecastSlot, ForecastTimeline, WeatherSnapshot};

pub const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

const MAX_FORECAST_DAYS: u32 = 16;

const SLOTS_PER_DAY: usize = 8;
const SLOT_HOURS: usize = 3;

const VARIABLES: &str = "temperature_2m,apparent_temperature,relative_humidity_2m,surface_pressure,\
wind_speed_10m,wind_direction_10m,wind_gusts_10m,weather_code,is_day";

#[derive(Debug, Deserialize)]
struct MeteoResponse {
    current: MeteoCurrent,
    hourly: MeteoHourly,
    daily: MeteoDaily,
}

#[derive(Debug, Deserialize)]
struct MeteoCurrent {
    temperature_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    relative_humidity_2m: Option<f64>,
    surface_pressure: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
    wind_gusts_10m: Option<f64>,
    weather_code: Option<i32>,
    is_day: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct MeteoHourly {
    time: Vec<i64>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    apparent_temperature: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    surface_pressure: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_10m: Vec<Option<f64>>,
    #[serde(default)]
    wind_gusts_10m: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<i32>>,
    #[serde(default)]
    is_day: Vec<Option<u8>>,
}

#[derive(Debug, Deserialize)]
struct MeteoDaily {
    sunrise: Vec<i64>,
    sunset: Vec<i64>,
}

fn at<T: Copy>(column: &[Option<T>], index: usize) -> Option<T> {
    column.get(index).copied().flatten()
}

/// Severity used to pick the code that represents a slot.
fn severity(code: i32) -> u8 {
    match code {
        95..=99 => 100,
        80..=86 => 80,
        71..=77 => 70,
        51..=67 => 60,
        45 | 48 => 50,
        3 => 30,
        2 => 20,
        1 => 10,
        _ => 0,
    }
}

/// Open-Meteo client.
pub struct OpenMeteoProvider {
    transport: Arc<dyn HttpTransport>,
}

impl OpenMeteoProvider {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    async fn fetch_snapshot(&self, request: &FetchRequest) -> Result<WeatherSnapshot, FetchError> {
        let query = build_query(request);

        tracing::debug!("Fetching weather data from Open-Meteo");
        let response = self.transport.get_json(FORECAST_URL, &query).await?;

        if !response.is_success() {
            tracing::warn!(
                "Invalid API response from Open-Meteo {}: '{}'",
                response.status,
                response.message()
            );
            if response.is_rate_limited() {
                return Err(FetchError::RateLimited(ProviderId::OpenMeteo));
            }
            return Err(FetchError::Status {
                status: response.status,
                message: response.message(),
            });
        }

        parse_snapshot(&response.body, request, Utc::now())
    }
}

impl WeatherProvider for OpenMeteoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    fn describe(&self) -> ProviderInfo {
        ProviderInfo {
            id: ProviderId::OpenMeteo,
            name: ProviderId::OpenMeteo.name(),
            url: ProviderId::OpenMeteo.url(),
            max_forecast_days: MAX_FORECAST_DAYS,
            requires_api_key: false,
        }
    }

    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> BoxFuture<'a, Result<WeatherSnapshot, FetchError>> {
        Box::pin(self.fetch_snapshot(request))
    }
}

fn build_query(request: &FetchRequest) -> Vec<(&'static str, String)> {
    vec![
        ("latitude", request.coordinates.latitude.to_string()),
        ("longitude", request.coordinates.longitude.to_string()),
        ("current", VARIABLES.to_string()),
        ("hourly", VARIABLES.to_string()),
        ("daily", "sunrise,sunset".to_string()),
        ("wind_speed_unit", "ms".to_string()),
        ("timezone", "UTC".to_string()),
        ("timeformat", "unixtime".to_string()),
        ("forecast_days", request.forecast_days.max(1).to_string()),
    ]
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, FetchError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| FetchError::MalformedResponse(format!("invalid timestamp {}", secs)))
}

/// First entry at or after `now`, else the last one.
fn next_event(times: &[i64], now: DateTime<Utc>) -> Result<DateTime<Utc>, FetchError> {
    let secs = times
        .iter()
        .copied()
        .find(|t| *t >= now.timestamp())
        .or_else(|| times.last().copied())
        .ok_or_else(|| FetchError::MalformedResponse("no sun times".to_string()))?;
    timestamp(secs)
}

fn build_conditions(
    code: Option<i32>,
    is_day: bool,
    values: [Option<f64>; 7],
    sunrise: DateTime<Utc>,
    sunset: DateTime<Utc>,
) -> Conditions {
    let [temperature, feels_like, humidity, pressure, wind_speed, wind_direction, gust_speed] = values;
    let (condition, icon) = match code {
        Some(code) => (
            conditions::condition_text(ProviderId::OpenMeteo, code).to_string(),
            conditions::icon_name(ProviderId::OpenMeteo, &conditions::wmo_icon_key(code, is_day), !is_day),
        ),
        None => (
            conditions::NOT_AVAILABLE.to_string(),
            conditions::icon_name(ProviderId::OpenMeteo, "", !is_day),
        ),
    };

    Conditions {
        temperature,
        feels_like,
        humidity,
        pressure,
        wind_speed,
        wind_direction,
        gust_speed,
        condition_code: code,
        condition,
        icon,
        sunrise,
        sunset,
    }
}

/// Build a snapshot from the response body.
///
/// Each slot takes its values from its first hour and the most severe
/// weather code of its hours.
pub fn parse_snapshot(
    body: &Value,
    request: &FetchRequest,
    now: DateTime<Utc>,
) -> Result<WeatherSnapshot, FetchError> {
    let response = MeteoResponse::deserialize(body)
        .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

    let sunrise = next_event(&response.daily.sunrise, now)?;
    let sunset = next_event(&response.daily.sunset, now)?;

    let c = &response.current;
    let current = build_conditions(
        c.weather_code,
        c.is_day.map_or(true, |d| d == 1),
        [
            c.temperature_2m,
            c.apparent_temperature,
            c.relative_humidity_2m,
            c.surface_pressure,
            c.wind_speed_10m,
            c.wind_direction_10m,
            c.wind_gusts_10m,
        ],
        sunrise,
        sunset,
    );

    let forecast = if request.include_forecast {
        let h = &response.hourly;
        let wanted = request.forecast_days.max(1) as usize * SLOTS_PER_DAY;

        let slots = (0..h.time.len())
            .step_by(SLOT_HOURS)
            .take(wanted)
            .map(|i| {
                let start = timestamp(h.time[i])?;
                let code = (i..(i + SLOT_HOURS).min(h.time.len()))
                    .filter_map(|j| at(&h.weather_code, j))
                    .max_by_key(|code| severity(*code));

                Ok(ForecastSlot {
                    start,
                    end: start + Duration::hours(SLOT_HOURS as i64),
                    conditions: build_conditions(
                        code,
                        at(&h.is_day, i).map_or(true, |d| d == 1),
                        [
                            at(&h.temperature_2m, i),
                            at(&h.apparent_temperature, i),
                            at(&h.relative_humidity_2m, i),
                            at(&h.surface_pressure, i),
                            at(&h.wind_speed_10m, i),
                            at(&h.wind_direction_10m, i),
                            at(&h.wind_gusts_10m, i),
                        ],
                        sunrise,
                        sunset,
                    ),
                })
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        if slots.is_empty() {
            return Err(FetchError::MalformedResponse("hourly forecast is empty".to_string()));
        }

        let timeline = ForecastTimeline::from_slots(slots, SLOTS_PER_DAY)
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;
        Some(timeline)
    } else {
        None
    };

    Ok(WeatherSnapshot {
        provider: ProviderId::OpenMeteo,
        current,
        forecast,
    })
}
