//! Weather Client
//!
//! Assembles a fetch request from the current settings and location,
//! runs it against one provider, and classifies the result for the
//! scheduler. Errors never leave this module; every fetch resolves to a
//! [`FetchOutcome`].

use std::sync::Arc;

use crate::location::LocationProvider;
use crate::providers::{FetchError, FetchRequest, ProviderId, ProviderRegistry};
use crate::storage::config::SettingsStore;
use crate::weather::WeatherSnapshot;

/// Result of one fetch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// New data arrived.
    Updated {
        snapshot: WeatherSnapshot,
        /// Forecast day setting after clamping to the provider maximum,
        /// when it had to be corrected
        corrected_forecast_days: Option<u32>,
    },
    /// The provider answered 429.
    RateLimited(ProviderId),
    /// Network, status or parse failure. Keep showing the cache.
    Unavailable,
    /// Retrying will not help until the settings change.
    Misconfigured(String),
}

/// Fetches weather for the active location.
pub struct WeatherClient {
    registry: ProviderRegistry,
    location: Arc<dyn LocationProvider>,
    settings: Arc<SettingsStore>,
}

impl WeatherClient {
    pub fn new(
        registry: ProviderRegistry,
        location: Arc<dyn LocationProvider>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            registry,
            location,
            settings,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    /// Fetch current conditions and forecast from `provider`.
    pub async fn fetch(&self, provider: ProviderId) -> FetchOutcome {
        let Some(source) = self.registry.get(provider) else {
            return FetchOutcome::Misconfigured(format!("{} is not available", provider));
        };
        let info = source.describe();
        let settings = self.settings.snapshot();

        if info.requires_api_key && !settings.has_api_key() {
            tracing::error!("{} selected without an API key", info.name);
            return FetchOutcome::Misconfigured(format!("{} requires an API key", info.name));
        }

        let coordinates = match self.location.coordinates().await {
            Ok(coords) => coords,
            Err(e) => {
                tracing::warn!("Could not resolve location: {}", e);
                return FetchOutcome::Unavailable;
            }
        };

        let days = info.clamp_forecast_days(settings.forecast_days);
        let corrected = days - 1;
        let corrected_forecast_days = if corrected != settings.forecast_days {
            tracing::info!(
                "{} serves at most {} days, limiting forecast to {} days after today",
                info.name,
                info.max_forecast_days,
                corrected
            );
            if let Err(e) = self.settings.set_forecast_days(corrected) {
                tracing::warn!("Failed to save corrected forecast days: {}", e);
            }
            Some(corrected)
        } else {
            None
        };

        let request = FetchRequest {
            coordinates,
            forecast_days: days,
            include_forecast: settings.forecast_enabled(),
            translate_condition: settings.translate_condition,
            provider_translations: settings.provider_translations,
            language: settings.number_locale().language().to_string(),
            api_key: settings.api_key.clone(),
        };

        match source.fetch(&request).await {
            Ok(snapshot) => {
                tracing::info!("Weather updated from {}", info.name);
                FetchOutcome::Updated {
                    snapshot,
                    corrected_forecast_days,
                }
            }
            Err(FetchError::RateLimited(id)) => {
                tracing::warn!("{} is rate limiting requests", id);
                FetchOutcome::RateLimited(id)
            }
            Err(FetchError::Configuration(message)) => {
                tracing::error!("{}: {}", info.name, message);
                FetchOutcome::Misconfigured(message)
            }
            Err(e) => {
                tracing::warn!("Fetch from {} failed: {}", info.name, e);
                FetchOutcome::Unavailable
            }
        }
    }
}
