//! Weather Providers
//!
//! Capability interface implemented by every remote weather source, plus
//! the registry the client and scheduler select providers from.

pub mod http;
pub mod openmeteo;
pub mod openweathermap;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::location::Coordinates;
use crate::weather::WeatherSnapshot;

// Re-export main types
pub use http::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};
pub use openmeteo::OpenMeteoProvider;
pub use openweathermap::OpenWeatherMapProvider;

/// Identifier of a supported provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenWeatherMap,
    OpenMeteo,
}

impl ProviderId {
    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderId::OpenWeatherMap => "OpenWeatherMap",
            ProviderId::OpenMeteo => "Open-Meteo",
        }
    }

    /// Provider homepage.
    pub fn url(&self) -> &'static str {
        match self {
            ProviderId::OpenWeatherMap => "https://openweathermap.org/",
            ProviderId::OpenMeteo => "https://open-meteo.com/",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub id: ProviderId,
    /// Display name
    pub name: &'static str,
    /// Homepage, also used as the reachability probe target
    pub url: &'static str,
    /// Longest forecast the provider serves, in days including today
    pub max_forecast_days: u32,
    /// Whether requests need a user API key
    pub requires_api_key: bool,
}

impl ProviderInfo {
    /// Days to request for a "days after today" setting.
    ///
    /// The result counts today and lies in `1..=max_forecast_days`.
    pub fn clamp_forecast_days(&self, days_after_today: u32) -> u32 {
        days_after_today
            .saturating_add(1)
            .clamp(1, self.max_forecast_days.max(1))
    }
}

/// How the scheduler reacts when a provider rate-limits us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Delay before retrying with the next provider
    pub rotation_delay: Duration,
    /// Delay before retrying once every provider was tried
    pub exhausted_backoff: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            rotation_delay: Duration::from_secs(1),
            exhausted_backoff: Duration::from_secs(600),
        }
    }
}

/// Provider description and retry policy, as the scheduler sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub info: ProviderInfo,
    pub policy: RateLimitPolicy,
}

/// Everything a provider needs for one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub coordinates: Coordinates,
    /// Days to fetch, including today (already clamped)
    pub forecast_days: u32,
    /// Skip the forecast entirely
    pub include_forecast: bool,
    /// Replace provider text with the local condition catalog
    pub translate_condition: bool,
    /// Ask the provider for localized condition text
    pub provider_translations: bool,
    /// Language subtag passed to providers that localize
    pub language: String,
    pub api_key: Option<String>,
}

/// Provider fetch failures.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    #[error("Too many requests to {0}")]
    RateLimited(ProviderId),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("HTTP status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// A remote weather source.
pub trait WeatherProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Static provider description.
    fn describe(&self) -> ProviderInfo;

    /// Retry policy after a rate limit.
    fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::default()
    }

    /// Fetch current conditions and, when requested, the forecast.
    fn fetch<'a>(
        &'a self,
        request: &'a FetchRequest,
    ) -> BoxFuture<'a, Result<WeatherSnapshot, FetchError>>;
}

/// Providers available to the client, in rotation order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn WeatherProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// OpenWeatherMap followed by Open-Meteo, sharing one transport.
    pub fn with_defaults(transport: Arc<dyn HttpTransport>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(OpenWeatherMapProvider::new(transport.clone())));
        registry.register(Arc::new(OpenMeteoProvider::new(transport)));
        registry
    }

    /// Add a provider, replacing any provider with the same id.
    pub fn register(&mut self, provider: Arc<dyn WeatherProvider>) {
        let id = provider.id();
        if let Some(slot) = self.providers.iter_mut().find(|p| p.id() == id) {
            *slot = provider;
        } else {
            self.providers.push(provider);
        }
    }

    pub fn get(&self, id: ProviderId) -> Option<Arc<dyn WeatherProvider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    /// Registered ids in rotation order.
    pub fn ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// Description and policy of every provider, in rotation order.
    pub fn profiles(&self) -> Vec<ProviderProfile> {
        self.providers
            .iter()
            .map(|p| ProviderProfile {
                info: p.describe(),
                policy: p.rate_limit_policy(),
            })
            .collect()
    }

    /// Providers automatic selection may use.
    ///
    /// Providers needing an API key are skipped when none is configured.
    pub fn usable(&self, has_api_key: bool) -> Vec<ProviderId> {
        self.providers
            .iter()
            .filter(|p| has_api_key || !p.describe().requires_api_key)
            .map(|p| p.id())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}
