//! Integration tests for the refresh service on paused time.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use weather_indicator::client::WeatherClient;
use weather_indicator::location::{Coordinates, FixedLocation};
use weather_indicator::notify::Notification;
use weather_indicator::providers::{ProviderId, ProviderRegistry};
use weather_indicator::service::{ServiceHandle, WeatherEvent, WeatherService};
use weather_indicator::storage::config::{IndicatorSettings, SettingsStore};

use super::notifier_mock::RecordingNotifier;
use super::provider_mock::{Reply, ScriptedProvider};
use super::transport_mock::MockTransport;

struct Harness {
    handle: ServiceHandle,
    owm: Arc<ScriptedProvider>,
    meteo: Arc<ScriptedProvider>,
    notifier: Arc<RecordingNotifier>,
    transport: Arc<MockTransport>,
    store: Arc<SettingsStore>,
}

fn start(owm: ScriptedProvider, meteo: ScriptedProvider) -> Harness {
    let owm = Arc::new(owm);
    let meteo = Arc::new(meteo);

    let mut registry = ProviderRegistry::new();
    registry.register(owm.clone());
    registry.register(meteo.clone());

    let store = Arc::new(SettingsStore::in_memory(IndicatorSettings::default()));
    let location = Arc::new(FixedLocation(Coordinates::new(60.17, 24.94)));
    let client = Arc::new(WeatherClient::new(registry, location, store.clone()));

    let transport = Arc::new(MockTransport::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let handle = WeatherService::new(client, transport.clone(), notifier.clone()).spawn();

    Harness {
        handle,
        owm,
        meteo,
        notifier,
        transport,
        store,
    }
}

fn healthy() -> Harness {
    start(
        ScriptedProvider::healthy(ProviderId::OpenWeatherMap),
        ScriptedProvider::healthy(ProviderId::OpenMeteo),
    )
}

/// Let the service run until it waits on a timer.
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_first_fetch_published_then_periodic_refresh() {
    let h = healthy();
    let mut latest = h.handle.watch();

    latest.changed().await.unwrap();
    let entry = h.handle.latest().expect("published entry");
    assert_eq!(entry.snapshot.provider, ProviderId::OpenWeatherMap);
    assert_eq!(h.owm.call_count(), 1);

    sleep(Duration::from_secs(599)).await;
    assert_eq!(h.owm.call_count(), 1);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(h.owm.call_count(), 2);
    assert_eq!(h.meteo.call_count(), 0);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_refreshes_thirty_seconds_apart() {
    let h = healthy();
    settle().await;
    assert_eq!(h.owm.call_count(), 1);

    h.handle.refresh().await;
    settle().await;
    assert_eq!(h.owm.call_count(), 2);
    let shown = h.handle.latest();

    sleep(Duration::from_secs(30)).await;
    h.handle.refresh().await;
    settle().await;

    assert_eq!(h.owm.call_count(), 2);
    assert_eq!(h.handle.latest(), shown);
    assert_eq!(h.notifier.received(), vec![Notification::ManualRefreshIgnored]);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_rotates_after_one_second() {
    let started = Instant::now();
    let h = start(
        ScriptedProvider::new(ProviderId::OpenWeatherMap, &[Reply::RateLimited], Reply::Weather),
        ScriptedProvider::healthy(ProviderId::OpenMeteo),
    );
    let mut latest = h.handle.watch();

    latest.changed().await.unwrap();
    let entry = h.handle.latest().expect("published entry");
    assert_eq!(entry.snapshot.provider, ProviderId::OpenMeteo);

    let retried_at = h.meteo.call_times()[0];
    assert_eq!(retried_at.duration_since(started), Duration::from_secs(1));
    assert!(h.notifier.received().is_empty());

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_exhausted_waits_ten_minutes() {
    let started = Instant::now();
    let h = start(
        ScriptedProvider::new(ProviderId::OpenWeatherMap, &[], Reply::RateLimited),
        ScriptedProvider::new(ProviderId::OpenMeteo, &[], Reply::RateLimited),
    );

    sleep(Duration::from_secs(5)).await;
    assert_eq!(h.owm.call_count(), 1);
    assert_eq!(h.meteo.call_count(), 1);
    assert_eq!(
        h.notifier.received(),
        vec![Notification::RateLimited {
            provider: ProviderId::OpenMeteo
        }]
    );
    assert!(h.handle.latest().is_none());

    sleep(Duration::from_secs(600)).await;
    let owm_calls = h.owm.call_times();
    assert_eq!(owm_calls.len(), 2);
    assert_eq!(owm_calls[1].duration_since(started), Duration::from_secs(601));

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_generic_failure_keeps_retrying_quietly() {
    let h = start(
        ScriptedProvider::new(ProviderId::OpenWeatherMap, &[Reply::ServerError], Reply::Weather),
        ScriptedProvider::healthy(ProviderId::OpenMeteo),
    );

    settle().await;
    assert!(h.handle.latest().is_none());
    assert_eq!(h.meteo.call_count(), 0);

    sleep(Duration::from_secs(600)).await;
    assert_eq!(h.owm.call_count(), 2);
    assert!(h.handle.latest().is_some());
    assert!(h.notifier.received().is_empty());

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_settings_change_clears_and_refetches() {
    let h = healthy();
    settle().await;
    let mut events = h.handle.subscribe();

    h.store.update(|s| s.forecast_days = 1).unwrap();
    h.handle.settings_changed().await;
    settle().await;

    assert_eq!(h.owm.call_count(), 2);
    assert_eq!(h.owm.requests()[1].forecast_days, 2);
    assert!(matches!(events.recv().await.unwrap(), WeatherEvent::Cleared));
    assert!(matches!(events.recv().await.unwrap(), WeatherEvent::Updated(_)));

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_with_fresh_cache_does_not_fetch() {
    let h = healthy();
    settle().await;

    h.transport.set_reachable(false);
    h.handle.network_changed().await;
    // Checks at 1.25s and 11.25s fail, the next one is due at 41.25s
    sleep(Duration::from_secs(20)).await;

    h.transport.set_reachable(true);
    sleep(Duration::from_secs(30)).await;

    assert_eq!(h.owm.call_count(), 1);
    assert!(h.handle.latest().is_some());

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_first_fetch_retried_when_network_comes_up() {
    let h = start(
        ScriptedProvider::new(ProviderId::OpenWeatherMap, &[Reply::ServerError], Reply::Weather),
        ScriptedProvider::healthy(ProviderId::OpenMeteo),
    );
    settle().await;
    assert_eq!(h.owm.call_count(), 1);
    assert!(h.handle.latest().is_none());

    h.handle.network_changed().await;
    sleep(Duration::from_secs(5)).await;

    assert_eq!(h.owm.call_count(), 2);
    assert!(h.handle.latest().is_some());

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_timers() {
    let h = healthy();
    settle().await;

    let Harness { handle, owm, .. } = h;
    handle.shutdown().await;

    sleep(Duration::from_secs(3600)).await;
    assert_eq!(owm.call_count(), 1);
}
