//! Unit tests for refresh scheduling decisions.

use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};

use weather_indicator::client::FetchOutcome;
use weather_indicator::notify::Notification;
use weather_indicator::providers::{ProviderId, ProviderInfo, ProviderProfile, RateLimitPolicy};
use weather_indicator::scheduler::{Command, Event, RefreshScheduler, SchedulerState};
use weather_indicator::storage::config::{IndicatorSettings, ProviderSelection};
use weather_indicator::weather::{Conditions, WeatherSnapshot};

fn profiles() -> Vec<ProviderProfile> {
    [
        (ProviderId::OpenWeatherMap, 5, true),
        (ProviderId::OpenMeteo, 16, false),
    ]
    .into_iter()
    .map(|(id, max_forecast_days, requires_api_key)| ProviderProfile {
        info: ProviderInfo {
            id,
            name: id.name(),
            url: id.url(),
            max_forecast_days,
            requires_api_key,
        },
        policy: RateLimitPolicy::default(),
    })
    .collect()
}

fn automatic() -> IndicatorSettings {
    IndicatorSettings {
        api_key: Some("0123456789abcdef".to_string()),
        provider: ProviderSelection::Automatic,
        ..Default::default()
    }
}

fn updated(provider: ProviderId) -> FetchOutcome {
    let t = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    FetchOutcome::Updated {
        snapshot: WeatherSnapshot {
            provider,
            current: Conditions {
                temperature: Some(-2.0),
                feels_like: Some(-6.0),
                humidity: Some(85.0),
                pressure: Some(1021.0),
                wind_speed: Some(5.0),
                wind_direction: Some(20.0),
                gust_speed: None,
                condition_code: Some(600),
                condition: "Light Snow".to_string(),
                icon: "weather-snow-symbolic".to_string(),
                sunrise: t,
                sunset: t,
            },
            forecast: None,
        },
        corrected_forecast_days: None,
    }
}

fn notifications(commands: &[Command]) -> Vec<&Notification> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::Notify(n) => Some(n),
            _ => None,
        })
        .collect()
}

/// Scheduler that already completed one successful fetch.
fn warmed_up(now: Instant) -> RefreshScheduler {
    let mut scheduler = RefreshScheduler::new(automatic(), profiles());
    scheduler.handle(Event::Start, now);
    scheduler.handle(
        Event::FetchCompleted(updated(ProviderId::OpenWeatherMap)),
        now,
    );
    scheduler
}

#[test]
fn test_manual_refresh_thirty_seconds_apart() {
    let t0 = Instant::now();
    let mut scheduler = warmed_up(t0);
    let cached = scheduler.cache().cloned();

    let first = scheduler.handle(Event::ManualRefresh, t0);
    assert_eq!(first, vec![Command::Fetch(ProviderId::OpenWeatherMap)]);
    scheduler.handle(
        Event::FetchCompleted(updated(ProviderId::OpenWeatherMap)),
        t0 + Duration::from_secs(2),
    );
    let after_first = scheduler.cache().cloned();
    assert_ne!(after_first, cached);

    let second = scheduler.handle(Event::ManualRefresh, t0 + Duration::from_secs(30));
    assert_eq!(
        notifications(&second),
        vec![&Notification::ManualRefreshIgnored]
    );
    assert_eq!(second.len(), 1);
    assert_eq!(scheduler.cache().cloned(), after_first);

    // Accepted again once the guard has passed
    let third = scheduler.handle(Event::ManualRefresh, t0 + Duration::from_secs(121));
    assert_eq!(third, vec![Command::Fetch(ProviderId::OpenWeatherMap)]);
}

#[test]
fn test_rate_limit_rotates_to_next_provider() {
    let t0 = Instant::now();
    let mut scheduler = RefreshScheduler::new(automatic(), profiles());
    scheduler.handle(Event::Start, t0);
    assert_eq!(scheduler.rotation().index(), 0);

    let commands = scheduler.handle(
        Event::FetchCompleted(FetchOutcome::RateLimited(ProviderId::OpenWeatherMap)),
        t0,
    );

    assert_eq!(scheduler.rotation().index(), 1);
    assert_eq!(commands, vec![Command::ScheduleRefresh(Duration::from_secs(1))]);
    assert!(notifications(&commands).is_empty());
    assert!(matches!(
        scheduler.state(),
        SchedulerState::Backoff {
            next_interval,
            ..
        } if next_interval == Duration::from_secs(1)
    ));

    let retry = scheduler.handle(Event::RefreshDue, t0 + Duration::from_secs(1));
    assert_eq!(retry, vec![Command::Fetch(ProviderId::OpenMeteo)]);
}

#[test]
fn test_rate_limit_exhausted_backs_off_and_notifies_once() {
    let t0 = Instant::now();
    let mut scheduler = RefreshScheduler::new(automatic(), profiles());
    scheduler.handle(Event::Start, t0);

    scheduler.handle(
        Event::FetchCompleted(FetchOutcome::RateLimited(ProviderId::OpenWeatherMap)),
        t0,
    );
    scheduler.handle(Event::RefreshDue, t0 + Duration::from_secs(1));
    let commands = scheduler.handle(
        Event::FetchCompleted(FetchOutcome::RateLimited(ProviderId::OpenMeteo)),
        t0 + Duration::from_secs(2),
    );

    assert_eq!(
        notifications(&commands),
        vec![&Notification::RateLimited {
            provider: ProviderId::OpenMeteo
        }]
    );
    assert!(commands.contains(&Command::ScheduleRefresh(Duration::from_secs(600))));
    assert_eq!(
        scheduler.state(),
        SchedulerState::Backoff {
            attempts_remaining: 0,
            next_interval: Duration::from_secs(600)
        }
    );
}

#[test]
fn test_fixed_provider_does_not_rotate() {
    let t0 = Instant::now();
    let settings = IndicatorSettings {
        provider: ProviderSelection::OpenMeteo,
        ..automatic()
    };
    let mut scheduler = RefreshScheduler::new(settings, profiles());
    assert_eq!(
        scheduler.handle(Event::Start, t0),
        vec![Command::Fetch(ProviderId::OpenMeteo)]
    );

    let commands = scheduler.handle(
        Event::FetchCompleted(FetchOutcome::RateLimited(ProviderId::OpenMeteo)),
        t0,
    );
    assert_eq!(notifications(&commands).len(), 1);
    assert!(commands.contains(&Command::ScheduleRefresh(Duration::from_secs(600))));
    assert_eq!(scheduler.rotation().current(), Some(ProviderId::OpenMeteo));
}

#[test]
fn test_success_after_rotation_resets_cycle() {
    let t0 = Instant::now();
    let mut scheduler = RefreshScheduler::new(automatic(), profiles());
    scheduler.handle(Event::Start, t0);
    scheduler.handle(
        Event::FetchCompleted(FetchOutcome::RateLimited(ProviderId::OpenWeatherMap)),
        t0,
    );
    scheduler.handle(Event::RefreshDue, t0);
    scheduler.handle(Event::FetchCompleted(updated(ProviderId::OpenMeteo)), t0);

    // Open-Meteo stays active; a rate limit there rotates instead of giving up
    scheduler.handle(Event::RefreshDue, t0);
    let commands = scheduler.handle(
        Event::FetchCompleted(FetchOutcome::RateLimited(ProviderId::OpenMeteo)),
        t0,
    );
    assert!(notifications(&commands).is_empty());
    assert_eq!(scheduler.rotation().current(), Some(ProviderId::OpenWeatherMap));
}

#[test]
fn test_superseded_reachability_check_is_ignored() {
    let t0 = Instant::now();
    let mut scheduler = warmed_up(t0);

    scheduler.handle(Event::NetworkChanged, t0);
    let stale_generation = scheduler.connectivity().generation();
    scheduler.handle(Event::NetworkChanged, t0);

    let commands = scheduler.handle(
        Event::Reachability {
            generation: stale_generation,
            reachable: false,
        },
        t0,
    );
    assert!(commands.is_empty());
    assert!(scheduler.connectivity().is_connected());
}

#[test]
fn test_reachability_retry_ladder() {
    let t0 = Instant::now();
    let mut scheduler = warmed_up(t0);
    scheduler.handle(Event::NetworkChanged, t0);
    let generation = scheduler.connectivity().generation();

    let delays: Vec<Duration> = (0..4)
        .flat_map(|_| {
            scheduler.handle(
                Event::Reachability {
                    generation,
                    reachable: false,
                },
                t0,
            )
        })
        .filter_map(|c| match c {
            Command::CheckReachability { after, .. } => Some(after),
            _ => None,
        })
        .collect();

    assert_eq!(
        delays,
        vec![
            Duration::from_secs(10),
            Duration::from_secs(30),
            Duration::from_secs(60)
        ]
    );
    assert_eq!(scheduler.state(), SchedulerState::AwaitingNetwork);
}
