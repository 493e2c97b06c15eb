//! Weather Indicator - headless runner
//!
//! Runs the refresh service against the saved settings and logs every
//! weather update until interrupted.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, Utc};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use weather_indicator::location::LocationResolver;
use weather_indicator::notify::LogNotifier;
use weather_indicator::providers::{HttpTransport, ProviderRegistry, ReqwestTransport};
use weather_indicator::scheduler::CacheEntry;
use weather_indicator::service::{WeatherEvent, WeatherService};
use weather_indicator::storage::config::{IndicatorSettings, SettingsStore};
use weather_indicator::units::Formatter;
use weather_indicator::weather::SunEvent;
use weather_indicator::WeatherClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Weather Indicator v{}", env!("CARGO_PKG_VERSION"));

    let settings = Arc::new(SettingsStore::open_default().context("Failed to load settings")?);
    if let Some(path) = settings.path() {
        tracing::info!("Using settings from {}", path.display());
    }

    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new().context("Failed to create HTTP client")?);
    let registry = ProviderRegistry::with_defaults(transport.clone());
    let location = Arc::new(LocationResolver::new(settings.clone(), transport.clone()));
    let client = Arc::new(WeatherClient::new(registry, location, settings.clone()));

    let handle = WeatherService::new(client, transport, Arc::new(LogNotifier)).spawn();
    let mut events = handle.subscribe();

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            event = events.recv() => match event {
                Ok(WeatherEvent::Updated(entry)) => log_summary(&entry, &settings.snapshot()),
                Ok(WeatherEvent::Cleared) => tracing::info!("Cached weather cleared"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} weather updates", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("Shutting down");
    handle.shutdown().await;
    Ok(())
}

fn log_summary(entry: &CacheEntry, settings: &IndicatorSettings) {
    let fmt = Formatter::new(settings, settings.number_locale());
    let now = Utc::now();
    let current = &entry.snapshot.current;

    tracing::info!(
        "{}: {} {} (feels like {}), humidity {}, pressure {}, wind {}",
        entry.snapshot.provider,
        current.condition,
        current.display_temperature(&fmt),
        current.display_feels_like(&fmt),
        current.display_humidity(&fmt),
        current.display_pressure(&fmt),
        current.display_wind(&fmt),
    );
    if let Some(gusts) = current.display_gusts(&fmt) {
        tracing::info!("Gusts {}", gusts);
    }

    match current.next_sun_event(now) {
        SunEvent::Sunrise(at) => tracing::info!("Sunrise {}", fmt.time(&at.with_timezone(&Local))),
        SunEvent::Sunset(at) => tracing::info!("Sunset {}", fmt.time(&at.with_timezone(&Local))),
    }

    let Some(forecast) = &entry.snapshot.forecast else {
        return;
    };
    for slot in forecast.today(now) {
        tracing::info!(
            "  {} {} {}",
            fmt.time(&slot.start.with_timezone(&Local)),
            fmt.temperature(slot.conditions.temperature),
            slot.conditions.condition
        );
    }

    let local_now = now.with_timezone(&Local);
    let days = forecast.days(&local_now, settings.forecast_days as usize);
    for (day, slots) in days.iter().enumerate() {
        let temps: Vec<f64> = slots
            .iter()
            .filter_map(|slot| slot.conditions.temperature)
            .collect();
        let low = temps.iter().copied().reduce(f64::min);
        let high = temps.iter().copied().reduce(f64::max);
        tracing::info!(
            "  Day +{}: {} to {}",
            day + 1,
            fmt.temperature(low),
            fmt.temperature(high)
        );
    }
}
