//! Refresh Scheduler
//!
//! Decides when to fetch, which provider to fetch from, and what to do
//! with the result. The scheduler performs no I/O: it consumes
//! [`Event`]s and returns [`Command`]s for the service to execute, so the
//! whole retry policy can be driven step by step in tests.

pub mod connectivity;
pub mod rotation;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::client::FetchOutcome;
use crate::notify::Notification;
use crate::providers::{ProviderId, ProviderProfile, RateLimitPolicy};
use crate::storage::config::IndicatorSettings;
use crate::weather::WeatherSnapshot;

// Re-export main types
pub use connectivity::{Connectivity, ProbeOutcome};
pub use rotation::ProviderRotation;

/// Minimum time between two accepted manual refreshes.
pub const MANUAL_REFRESH_GUARD: Duration = Duration::from_secs(120);

/// Retry delay after a failed fetch.
pub const FAILURE_RETRY: Duration = Duration::from_secs(600);

/// Last successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub snapshot: WeatherSnapshot,
    /// Wall-clock time of the fetch
    pub fetched_at: DateTime<Utc>,
    received: Instant,
}

impl CacheEntry {
    pub fn new(snapshot: WeatherSnapshot, fetched_at: DateTime<Utc>, received: Instant) -> Self {
        Self {
            snapshot,
            fetched_at,
            received,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.received)
    }

    /// Whether the entry is older than the settings allow.
    pub fn is_stale(&self, settings: &IndicatorSettings, now: Instant) -> bool {
        self.age(now) > settings.max_cache_age()
    }
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing scheduled
    Idle,
    /// Waiting for a reachability check after a network change
    AwaitingNetwork,
    /// A fetch is in flight
    Fetching,
    /// Waiting for the next periodic refresh
    Cooldown { interval: Duration },
    /// Waiting to retry after a rate limit
    Backoff {
        attempts_remaining: u32,
        next_interval: Duration,
    },
}

/// Inputs to the scheduler.
#[derive(Debug, Clone)]
pub enum Event {
    /// Service started
    Start,
    /// The refresh timer fired
    RefreshDue,
    /// The user asked for a refresh
    ManualRefresh,
    /// The system reported a network change
    NetworkChanged,
    /// A reachability check finished
    Reachability { generation: u64, reachable: bool },
    /// The in-flight fetch finished
    FetchCompleted(FetchOutcome),
    /// Settings were modified
    SettingsChanged(IndicatorSettings),
    /// The owner is going away
    Shutdown,
}

/// Work for the service.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Start a fetch from the provider
    Fetch(ProviderId),
    /// (Re)arm the refresh timer, replacing any pending one
    ScheduleRefresh(Duration),
    /// Probe `url` after a delay, replacing any pending check
    CheckReachability {
        generation: u64,
        url: &'static str,
        after: Duration,
    },
    Notify(Notification),
    /// Show this entry
    Publish(Arc<CacheEntry>),
    /// Drop whatever is shown
    ClearCache,
    /// Stop timers and abandon in-flight work
    CancelAll,
}

/// Providers the scheduler may fetch from with these settings.
pub fn candidate_providers(
    profiles: &[ProviderProfile],
    settings: &IndicatorSettings,
) -> Vec<ProviderId> {
    match settings.provider.fixed() {
        Some(id) => profiles
            .iter()
            .filter(|p| p.info.id == id)
            .map(|p| p.info.id)
            .collect(),
        None => profiles
            .iter()
            .filter(|p| settings.has_api_key() || !p.info.requires_api_key)
            .map(|p| p.info.id)
            .collect(),
    }
}

/// Refresh policy for one indicator.
#[derive(Debug)]
pub struct RefreshScheduler {
    state: SchedulerState,
    /// State to return to once a network change settles
    resume_state: SchedulerState,
    settings: IndicatorSettings,
    profiles: Vec<ProviderProfile>,
    rotation: ProviderRotation,
    connectivity: Connectivity,
    cache: Option<Arc<CacheEntry>>,
    last_manual_refresh: Option<Instant>,
    in_flight: Option<ProviderId>,
    /// The in-flight fetch used settings that are now outdated
    discard_in_flight: bool,
    misconfiguration_reported: bool,
    stopped: bool,
}

impl RefreshScheduler {
    pub fn new(settings: IndicatorSettings, profiles: Vec<ProviderProfile>) -> Self {
        let rotation = ProviderRotation::new(candidate_providers(&profiles, &settings));
        Self {
            state: SchedulerState::Idle,
            resume_state: SchedulerState::Idle,
            settings,
            profiles,
            rotation,
            connectivity: Connectivity::new(),
            cache: None,
            last_manual_refresh: None,
            in_flight: None,
            discard_in_flight: false,
            misconfiguration_reported: false,
            stopped: false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn cache(&self) -> Option<&Arc<CacheEntry>> {
        self.cache.as_ref()
    }

    /// Settings the scheduler currently acts on.
    pub fn settings(&self) -> &IndicatorSettings {
        &self.settings
    }

    pub fn rotation(&self) -> &ProviderRotation {
        &self.rotation
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn in_flight(&self) -> Option<ProviderId> {
        self.in_flight
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Process one event at monotonic time `now`.
    pub fn handle(&mut self, event: Event, now: Instant) -> Vec<Command> {
        let mut commands = Vec::new();
        if self.stopped {
            tracing::debug!("Ignoring {:?} after shutdown", event);
            return commands;
        }

        match event {
            Event::Start => self.on_start(&mut commands),
            Event::RefreshDue => {
                tracing::debug!("Refresh timer fired");
                self.begin_fetch(&mut commands);
            }
            Event::ManualRefresh => self.on_manual_refresh(now, &mut commands),
            Event::NetworkChanged => self.on_network_changed(&mut commands),
            Event::Reachability {
                generation,
                reachable,
            } => self.on_reachability(generation, reachable, now, &mut commands),
            Event::FetchCompleted(outcome) => self.on_fetch_completed(outcome, now, &mut commands),
            Event::SettingsChanged(settings) => self.on_settings_changed(settings, &mut commands),
            Event::Shutdown => self.on_shutdown(&mut commands),
        }
        commands
    }

    fn on_start(&mut self, commands: &mut Vec<Command>) {
        let delay = Duration::from_secs(self.settings.startup_delay_secs);
        if delay.is_zero() {
            self.begin_fetch(commands);
        } else {
            tracing::info!("Delaying first fetch by {}s", delay.as_secs());
            commands.push(Command::ScheduleRefresh(delay));
        }
    }

    fn on_manual_refresh(&mut self, now: Instant, commands: &mut Vec<Command>) {
        if let Some(last) = self.last_manual_refresh {
            if now.saturating_duration_since(last) < MANUAL_REFRESH_GUARD {
                tracing::info!("Ignoring manual refresh, last one was too recent");
                commands.push(Command::Notify(Notification::ManualRefreshIgnored));
                return;
            }
        }

        tracing::info!("Manual refresh requested");
        // A request merged into a running fetch does not start the guard
        if self.begin_fetch(commands) {
            self.last_manual_refresh = Some(now);
        }
    }

    fn on_network_changed(&mut self, commands: &mut Vec<Command>) {
        let (generation, after) = self.connectivity.network_changed();
        tracing::debug!("Network changed, checking reachability (check {})", generation);

        if !matches!(
            self.state,
            SchedulerState::Fetching | SchedulerState::AwaitingNetwork
        ) {
            self.resume_state = self.state;
            self.state = SchedulerState::AwaitingNetwork;
        }

        if let Some(url) = self.probe_url() {
            commands.push(Command::CheckReachability {
                generation,
                url,
                after,
            });
        }
    }

    fn on_reachability(
        &mut self,
        generation: u64,
        reachable: bool,
        now: Instant,
        commands: &mut Vec<Command>,
    ) {
        match self.connectivity.probe_result(generation, reachable) {
            ProbeOutcome::Superseded => {
                tracing::debug!("Ignoring outdated reachability check {}", generation);
            }
            ProbeOutcome::Reconnected => {
                tracing::info!("Network reachable again");
                let stale = self
                    .cache
                    .as_ref()
                    .map_or(true, |entry| entry.is_stale(&self.settings, now));
                if stale {
                    if self.cache.take().is_some() {
                        commands.push(Command::ClearCache);
                    }
                    self.settle_network();
                    self.begin_fetch(commands);
                } else {
                    self.settle_network();
                }
            }
            ProbeOutcome::StillConnected => {
                self.settle_network();
                // Nothing shown yet and only a failure retry pending
                if self.cache.is_none() && matches!(self.state, SchedulerState::Cooldown { .. }) {
                    tracing::info!("Network reachable and nothing cached, fetching now");
                    self.begin_fetch(commands);
                }
            }
            ProbeOutcome::Retry(after) => {
                tracing::warn!(
                    "Network unreachable, checking again in {}s",
                    after.as_secs()
                );
                if let Some(url) = self.probe_url() {
                    commands.push(Command::CheckReachability {
                        generation,
                        url,
                        after,
                    });
                }
            }
            ProbeOutcome::GaveUp => {
                tracing::warn!("Network still unreachable, waiting for the next network change");
            }
        }
    }

    fn on_fetch_completed(
        &mut self,
        outcome: FetchOutcome,
        now: Instant,
        commands: &mut Vec<Command>,
    ) {
        let Some(provider) = self.in_flight.take() else {
            tracing::debug!("Dropping result of an abandoned fetch");
            return;
        };

        if std::mem::take(&mut self.discard_in_flight) {
            tracing::debug!("Settings changed while fetching from {}, fetching again", provider);
            self.begin_fetch(commands);
            return;
        }

        match outcome {
            FetchOutcome::Updated {
                snapshot,
                corrected_forecast_days,
            } => {
                if let Some(days) = corrected_forecast_days {
                    self.settings.forecast_days = days;
                }
                self.rotation.reset();
                self.connectivity.mark_connected();
                self.misconfiguration_reported = false;

                let entry = Arc::new(CacheEntry::new(snapshot, Utc::now(), now));
                self.cache = Some(entry.clone());
                commands.push(Command::Publish(entry));
                self.schedule_periodic(commands);
            }
            FetchOutcome::RateLimited(limited) => {
                let policy = self.policy(limited);
                match self.rotation.advance() {
                    Some(next) => {
                        tracing::info!("{} is rate limiting, trying {}", limited, next);
                        self.state = SchedulerState::Backoff {
                            attempts_remaining: self.rotation.untried() as u32,
                            next_interval: policy.rotation_delay,
                        };
                        commands.push(Command::ScheduleRefresh(policy.rotation_delay));
                    }
                    None => {
                        tracing::warn!(
                            "{} is rate limiting and no other provider is left, retrying in {}s",
                            limited,
                            policy.exhausted_backoff.as_secs()
                        );
                        self.state = SchedulerState::Backoff {
                            attempts_remaining: 0,
                            next_interval: policy.exhausted_backoff,
                        };
                        commands.push(Command::Notify(Notification::RateLimited {
                            provider: limited,
                        }));
                        commands.push(Command::ScheduleRefresh(policy.exhausted_backoff));
                    }
                }
            }
            FetchOutcome::Unavailable => {
                tracing::warn!(
                    "No weather data from {}, retrying in {}s",
                    provider,
                    FAILURE_RETRY.as_secs()
                );
                self.state = SchedulerState::Cooldown {
                    interval: FAILURE_RETRY,
                };
                commands.push(Command::ScheduleRefresh(FAILURE_RETRY));
            }
            FetchOutcome::Misconfigured(message) => {
                self.state = SchedulerState::Idle;
                self.report_misconfiguration(message, commands);
            }
        }
    }

    fn on_settings_changed(&mut self, settings: IndicatorSettings, commands: &mut Vec<Command>) {
        if settings.frozen {
            tracing::debug!("Settings frozen, ignoring change");
            return;
        }

        let change = self.settings.diff(&settings);
        let providers_changed = self.settings.provider != settings.provider
            || self.settings.has_api_key() != settings.has_api_key();
        self.settings = settings;

        if change.is_empty() {
            return;
        }
        tracing::debug!("Settings changed: {:?}", change);

        if providers_changed {
            self.rotation
                .set_providers(candidate_providers(&self.profiles, &self.settings));
        }

        if change.refetch {
            tracing::info!("Settings changed, refreshing weather");
            self.misconfiguration_reported = false;
            if self.cache.take().is_some() {
                commands.push(Command::ClearCache);
            }
            if self.in_flight.is_some() {
                self.discard_in_flight = true;
            } else {
                self.begin_fetch(commands);
            }
            return;
        }

        if change.reschedule
            && self.in_flight.is_none()
            && matches!(self.state, SchedulerState::Cooldown { .. })
        {
            self.schedule_periodic(commands);
        }

        if change.display {
            if let Some(entry) = &self.cache {
                commands.push(Command::Publish(entry.clone()));
            }
        }
    }

    fn on_shutdown(&mut self, commands: &mut Vec<Command>) {
        tracing::info!("Scheduler shutting down");
        self.stopped = true;
        self.connectivity.cancel();
        self.in_flight = None;
        self.discard_in_flight = false;
        self.state = SchedulerState::Idle;
        commands.push(Command::CancelAll);
    }

    /// Start a fetch unless one is already running. Returns whether a
    /// fetch was issued.
    fn begin_fetch(&mut self, commands: &mut Vec<Command>) -> bool {
        if let Some(provider) = self.in_flight {
            tracing::debug!("Fetch from {} already in flight", provider);
            return false;
        }

        let Some(provider) = self.rotation.current() else {
            self.state = SchedulerState::Idle;
            self.report_misconfiguration(
                "No usable weather provider. Add an API key or select another provider."
                    .to_string(),
                commands,
            );
            return false;
        };

        tracing::debug!("Fetching weather from {}", provider);
        self.in_flight = Some(provider);
        self.state = SchedulerState::Fetching;
        commands.push(Command::Fetch(provider));
        true
    }

    fn schedule_periodic(&mut self, commands: &mut Vec<Command>) {
        let interval = self.settings.current_interval();
        self.state = SchedulerState::Cooldown { interval };
        commands.push(Command::ScheduleRefresh(interval));
    }

    fn settle_network(&mut self) {
        if self.state == SchedulerState::AwaitingNetwork {
            self.state = self.resume_state;
        }
    }

    fn report_misconfiguration(&mut self, message: String, commands: &mut Vec<Command>) {
        if self.misconfiguration_reported {
            tracing::debug!("Still misconfigured: {}", message);
            return;
        }
        tracing::error!("{}", message);
        self.misconfiguration_reported = true;
        commands.push(Command::Notify(Notification::Misconfigured(message)));
    }

    fn policy(&self, provider: ProviderId) -> RateLimitPolicy {
        self.profiles
            .iter()
            .find(|p| p.info.id == provider)
            .map(|p| p.policy)
            .unwrap_or_default()
    }

    fn probe_url(&self) -> Option<&'static str> {
        self.rotation
            .current()
            .or_else(|| self.profiles.first().map(|p| p.info.id))
            .map(|id| id.url())
    }
}
