//! OpenWeatherMap Provider
//!
//! Current conditions from `/data/2.5/weather` and the 5 day / 3 hour
//! forecast from `/data/2.5/forecast`, fetched concurrently.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;

use super::http::{HttpResponse, HttpTransport};
use super::{FetchError, FetchRequest, ProviderId, ProviderInfo, WeatherProvider};
use crate::weather::conditions;
use crate::weather::{correct_sun_times, Conditions, ForecastSlot, ForecastTimeline, PartOfDay, WeatherSnapshot};

pub const CURRENT_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";

/// The free forecast endpoint covers five days.
const MAX_FORECAST_DAYS: u32 = 5;

const SLOTS_PER_DAY: usize = 8;
const SLOT_HOURS: i64 = 3;

#[derive(Debug, Deserialize)]
struct OwmCurrent {
    main: OwmMain,
    weather: Vec<OwmWeather>,
    wind: Option<OwmWind>,
    sys: OwmSun,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: Option<f64>,
    feels_like: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmWeather {
    id: i32,
    icon: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: Option<f64>,
    deg: Option<f64>,
    gust: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmSun {
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwmForecast {
    list: Vec<OwmForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct OwmForecastEntry {
    dt_txt: String,
    main: OwmMain,
    weather: Vec<OwmWeather>,
    wind: Option<OwmWind>,
    sys: OwmPod,
}

#[derive(Debug, Deserialize)]
struct OwmPod {
    pod: String,
}

/// OpenWeatherMap client. Requires an API key.
pub struct OpenWeatherMapProvider {
    transport: Arc<dyn HttpTransport>,
}

impl OpenWeatherMapProvider {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    async fn fetch_snapshot(&self, request: &FetchRequest) -> Result<WeatherSnapshot, FetchError> {
        let Some(api_key) = request.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Err(FetchError::Configuration(
                "OpenWeatherMap requires an API key".to_string(),
            ));
        };

        let query = build_query(request, api_key);

        tracing::debug!("Fetching weather data from OpenWeatherMap");
        let (current, forecast) = futures::join!(
            self.transport.get_json(CURRENT_URL, &query),
            self.transport.get_json(FORECAST_URL, &query)
        );
        let (current, forecast) = (current?, forecast?);

        check_responses(&current, &forecast)?;
        parse_snapshot(&current.body, &forecast.body, request, &Local::now())
    }
}

impl WeatherProvider for OpenWeatherMapProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeatherMap
    }

    fn describe(&self) -> ProviderInfo {
        ProviderInfo {
            id: ProviderId::OpenWeatherMap,
            name: ProviderId::OpenWeatherMap.name(),
            url: ProviderId::OpenWeatherMap.url(),
            max_forecast_days: MAX_FORECAST_DAYS,
            requires_api_key: true,
        }
    }

    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> BoxFuture<'a, Result<WeatherSnapshot, FetchError>> {
        Box::pin(self.fetch_snapshot(request))
    }
}

fn build_query(request: &FetchRequest, api_key: &str) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("lat", request.coordinates.latitude.to_string()),
        ("lon", request.coordinates.longitude.to_string()),
        ("units", "metric".to_string()),
    ];
    if request.provider_translations {
        query.push(("lang", request.language.clone()));
    }
    query.push(("appid", api_key.to_string()));
    query
}

/// Both requests must succeed; a 429 from either one is a rate limit.
fn check_responses(current: &HttpResponse, forecast: &HttpResponse) -> Result<(), FetchError> {
    if current.is_success() && forecast.is_success() {
        return Ok(());
    }

    tracing::warn!(
        "Invalid API response from OpenWeatherMap {}/{}: '{}'/'{}'",
        current.status,
        forecast.status,
        current.message(),
        forecast.message()
    );

    if current.is_rate_limited() || forecast.is_rate_limited() {
        return Err(FetchError::RateLimited(ProviderId::OpenWeatherMap));
    }

    let failed = if current.is_success() { forecast } else { current };
    Err(FetchError::Status {
        status: failed.status,
        message: failed.message(),
    })
}

/// Parse `dt_txt` ("2024-06-01 12:00:00", UTC) down to the hour.
fn parse_slot_start(dt_txt: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(dt_txt.get(..10)?, "%Y-%m-%d").ok()?;
    let hour: u32 = dt_txt.get(11..13)?.parse().ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(hour, 0, 0)?))
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, FetchError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| FetchError::MalformedResponse(format!("invalid timestamp {}", secs)))
}

fn condition_text(request: &FetchRequest, weather: &OwmWeather) -> String {
    if !request.translate_condition || request.provider_translations {
        weather.description.clone()
    } else {
        conditions::condition_text(ProviderId::OpenWeatherMap, weather.id).to_string()
    }
}

fn build_conditions(
    request: &FetchRequest,
    main: &OwmMain,
    weather: &[OwmWeather],
    wind: Option<&OwmWind>,
    sunrise: DateTime<Utc>,
    sunset: DateTime<Utc>,
) -> Result<Conditions, FetchError> {
    let weather = weather
        .first()
        .ok_or_else(|| FetchError::MalformedResponse("missing weather entry".to_string()))?;
    let is_night = weather.icon.ends_with('n');

    Ok(Conditions {
        temperature: main.temp,
        feels_like: main.feels_like,
        humidity: main.humidity,
        pressure: main.pressure,
        wind_speed: wind.and_then(|w| w.speed),
        wind_direction: wind.and_then(|w| w.deg),
        gust_speed: wind.and_then(|w| w.gust),
        condition_code: Some(weather.id),
        condition: condition_text(request, weather),
        icon: conditions::icon_name(ProviderId::OpenWeatherMap, &weather.icon, is_night),
        sunrise,
        sunset,
    })
}

/// Build a snapshot from the two response bodies.
///
/// `now` fixes the calendar day used to correct sunrise and sunset.
pub fn parse_snapshot<Tz: TimeZone>(
    current: &Value,
    forecast: &Value,
    request: &FetchRequest,
    now: &DateTime<Tz>,
) -> Result<WeatherSnapshot, FetchError> {
    let current = OwmCurrent::deserialize(current)
        .map_err(|e| FetchError::MalformedResponse(format!("current weather: {}", e)))?;
    let forecast = OwmForecast::deserialize(forecast)
        .map_err(|e| FetchError::MalformedResponse(format!("forecast: {}", e)))?;

    let first = forecast
        .list
        .first()
        .ok_or_else(|| FetchError::MalformedResponse("forecast list is empty".to_string()))?;
    let part_of_day = PartOfDay::from_flag(&first.sys.pod)
        .ok_or_else(|| FetchError::MalformedResponse(format!("unknown part of day '{}'", first.sys.pod)))?;

    let (sunrise, sunset) = correct_sun_times(
        timestamp(current.sys.sunrise)?,
        timestamp(current.sys.sunset)?,
        part_of_day,
        now,
    );

    let conditions = build_conditions(
        request,
        &current.main,
        &current.weather,
        current.wind.as_ref(),
        sunrise,
        sunset,
    )?;

    let forecast = if request.include_forecast {
        let wanted = request.forecast_days.max(1) as usize * SLOTS_PER_DAY;
        let slots = forecast
            .list
            .iter()
            .take(wanted)
            .map(|entry| {
                let start = parse_slot_start(&entry.dt_txt).ok_or_else(|| {
                    FetchError::MalformedResponse(format!("bad forecast time '{}'", entry.dt_txt))
                })?;
                Ok(ForecastSlot {
                    start,
                    end: start + Duration::hours(SLOT_HOURS),
                    conditions: build_conditions(
                        request,
                        &entry.main,
                        &entry.weather,
                        entry.wind.as_ref(),
                        sunrise,
                        sunset,
                    )?,
                })
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        let timeline = ForecastTimeline::from_slots(slots, SLOTS_PER_DAY)
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;
        Some(timeline)
    } else {
        None
    };

    Ok(WeatherSnapshot {
        provider: ProviderId::OpenWeatherMap,
        current: conditions,
        forecast,
    })
}
