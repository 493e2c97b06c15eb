//! Scripted weather provider shared by the integration tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use futures::future::BoxFuture;
use tokio::time::Instant;

use weather_indicator::providers::{
    FetchError, FetchRequest, ProviderId, ProviderInfo, WeatherProvider,
};
use weather_indicator::weather::{Conditions, WeatherSnapshot};

/// What the provider answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Weather,
    RateLimited,
    ServerError,
}

/// Provider answering from a script, then with a fallback reply.
pub struct ScriptedProvider {
    id: ProviderId,
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: Mutex<Vec<(Instant, FetchRequest)>>,
}

impl ScriptedProvider {
    pub fn new(id: ProviderId, script: &[Reply], fallback: Reply) -> Self {
        Self {
            id,
            script: Mutex::new(script.iter().copied().collect()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with weather.
    pub fn healthy(id: ProviderId) -> Self {
        Self::new(id, &[], Reply::Weather)
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// When each fetch started.
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.calls.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }
}

impl WeatherProvider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn describe(&self) -> ProviderInfo {
        ProviderInfo {
            id: self.id,
            name: self.id.name(),
            url: self.id.url(),
            max_forecast_days: 5,
            requires_api_key: false,
        }
    }

    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> BoxFuture<'a, Result<WeatherSnapshot, FetchError>> {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));
        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        let id = self.id;
        Box::pin(async move {
            match reply {
                Reply::Weather => Ok(snapshot(id)),
                Reply::RateLimited => Err(FetchError::RateLimited(id)),
                Reply::ServerError => Err(FetchError::Status {
                    status: 502,
                    message: "Bad Gateway".to_string(),
                }),
            }
        })
    }
}

/// Minimal snapshot without forecast.
pub fn snapshot(provider: ProviderId) -> WeatherSnapshot {
    let sunrise = Utc.with_ymd_and_hms(2024, 7, 1, 4, 45, 0).unwrap();
    let sunset = Utc.with_ymd_and_hms(2024, 7, 1, 19, 30, 0).unwrap();
    WeatherSnapshot {
        provider,
        current: Conditions {
            temperature: Some(24.5),
            feels_like: Some(25.0),
            humidity: Some(48.0),
            pressure: Some(1012.0),
            wind_speed: Some(2.5),
            wind_direction: Some(270.0),
            gust_speed: Some(6.0),
            condition_code: Some(800),
            condition: "Clear Sky".to_string(),
            icon: "weather-clear-symbolic".to_string(),
            sunrise,
            sunset,
        },
        forecast: None,
    }
}
