//! Weather Service
//!
//! Tokio task driving a [`RefreshScheduler`]: it owns the refresh timer,
//! the reachability check and the in-flight fetch, feeds their results
//! back as events, and publishes cache updates to subscribers.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::client::{FetchOutcome, WeatherClient};
use crate::notify::Notifier;
use crate::providers::HttpTransport;
use crate::scheduler::{CacheEntry, Command, Event, RefreshScheduler};
use crate::storage::config::SettingsStore;

/// Cache changes seen by subscribers.
#[derive(Debug, Clone)]
pub enum WeatherEvent {
    /// New data, or the same data to be shown with new settings
    Updated(Arc<CacheEntry>),
    /// Shown data is no longer valid
    Cleared,
}

#[derive(Debug)]
enum Message {
    ManualRefresh,
    NetworkChanged,
    SettingsChanged,
    Shutdown,
}

/// Handle to a running service.
pub struct ServiceHandle {
    tx: mpsc::Sender<Message>,
    latest: watch::Receiver<Option<Arc<CacheEntry>>>,
    events: broadcast::Sender<WeatherEvent>,
    task: JoinHandle<()>,
}

impl ServiceHandle {
    /// Ask for a refresh. Requests closer than two minutes apart are
    /// rejected with a notification.
    pub async fn refresh(&self) {
        self.send(Message::ManualRefresh).await;
    }

    /// Report a change in network state.
    pub async fn network_changed(&self) {
        self.send(Message::NetworkChanged).await;
    }

    /// Re-read the settings store.
    pub async fn settings_changed(&self) {
        self.send(Message::SettingsChanged).await;
    }

    /// Last published cache entry.
    pub fn latest(&self) -> Option<Arc<CacheEntry>> {
        self.latest.borrow().clone()
    }

    /// Receiver that always holds the current cache entry.
    pub fn watch(&self) -> watch::Receiver<Option<Arc<CacheEntry>>> {
        self.latest.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WeatherEvent> {
        self.events.subscribe()
    }

    /// Stop the service and wait for it to finish.
    pub async fn shutdown(self) {
        self.send(Message::Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::warn!("Weather service task failed: {}", e);
        }
    }

    async fn send(&self, message: Message) {
        if self.tx.send(message).await.is_err() {
            tracing::debug!("Weather service already stopped");
        }
    }
}

/// Everything the service task needs.
pub struct WeatherService {
    client: Arc<WeatherClient>,
    settings: Arc<SettingsStore>,
    transport: Arc<dyn HttpTransport>,
    notifier: Arc<dyn Notifier>,
}

impl WeatherService {
    pub fn new(
        client: Arc<WeatherClient>,
        transport: Arc<dyn HttpTransport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings: client.settings().clone(),
            client,
            transport,
            notifier,
        }
    }

    /// Start the service on the current runtime.
    pub fn spawn(self) -> ServiceHandle {
        let (tx, rx) = mpsc::channel(16);
        let (latest_tx, latest) = watch::channel(None);
        let (events, _) = broadcast::channel(16);

        let task = tokio::spawn(self.run(rx, latest_tx, events.clone()));

        ServiceHandle {
            tx,
            latest,
            events,
            task,
        }
    }

    async fn run(
        self,
        mut rx: mpsc::Receiver<Message>,
        latest: watch::Sender<Option<Arc<CacheEntry>>>,
        events: broadcast::Sender<WeatherEvent>,
    ) {
        let mut scheduler =
            RefreshScheduler::new(self.settings.snapshot(), self.client.registry().profiles());
        let mut tasks = Tasks::default();

        tracing::info!("Weather service started");
        let mut commands = scheduler.handle(Event::Start, now());

        loop {
            for command in commands.drain(..) {
                self.execute(command, &mut tasks, &latest, &events);
            }
            if scheduler.is_stopped() {
                break;
            }

            let wake = tokio::select! {
                message = rx.recv() => Wake::Message(message),
                _ = sleep_opt(tasks.refresh_at) => Wake::RefreshDue,
                _ = sleep_opt(tasks.probe_at.as_ref().map(|p| p.at)) => Wake::ProbeDue,
                outcome = poll_opt(&mut tasks.fetch) => Wake::Fetched(outcome),
                result = poll_opt(&mut tasks.probe) => Wake::Probed(result),
            };

            let event = match wake {
                Wake::Message(Some(Message::ManualRefresh)) => Event::ManualRefresh,
                Wake::Message(Some(Message::NetworkChanged)) => Event::NetworkChanged,
                Wake::Message(Some(Message::SettingsChanged)) => {
                    Event::SettingsChanged(self.settings.snapshot())
                }
                Wake::Message(Some(Message::Shutdown)) | Wake::Message(None) => Event::Shutdown,
                Wake::RefreshDue => {
                    tasks.refresh_at = None;
                    Event::RefreshDue
                }
                Wake::ProbeDue => {
                    if let Some(pending) = tasks.probe_at.take() {
                        let transport = self.transport.clone();
                        tasks.probe = Some(Box::pin(async move {
                            (pending.generation, transport.probe(pending.url).await)
                        }));
                    }
                    continue;
                }
                Wake::Fetched(outcome) => {
                    tasks.fetch = None;
                    Event::FetchCompleted(outcome)
                }
                Wake::Probed((generation, reachable)) => {
                    tasks.probe = None;
                    Event::Reachability {
                        generation,
                        reachable,
                    }
                }
            };

            commands = scheduler.handle(event, now());
        }

        tracing::info!("Weather service stopped");
    }

    fn execute(
        &self,
        command: Command,
        tasks: &mut Tasks,
        latest: &watch::Sender<Option<Arc<CacheEntry>>>,
        events: &broadcast::Sender<WeatherEvent>,
    ) {
        match command {
            Command::Fetch(provider) => {
                let client = self.client.clone();
                tasks.fetch = Some(Box::pin(async move { client.fetch(provider).await }));
            }
            Command::ScheduleRefresh(after) => {
                tracing::debug!("Next refresh in {}s", after.as_secs());
                tasks.refresh_at = Some(Instant::now() + after);
            }
            Command::CheckReachability {
                generation,
                url,
                after,
            } => {
                tasks.probe = None;
                tasks.probe_at = Some(PendingProbe {
                    at: Instant::now() + after,
                    generation,
                    url,
                });
            }
            Command::Notify(notification) => self.notifier.notify(&notification),
            Command::Publish(entry) => {
                latest.send_replace(Some(entry.clone()));
                // No subscribers is fine
                let _ = events.send(WeatherEvent::Updated(entry));
            }
            Command::ClearCache => {
                latest.send_replace(None);
                let _ = events.send(WeatherEvent::Cleared);
            }
            Command::CancelAll => *tasks = Tasks::default(),
        }
    }
}

struct PendingProbe {
    at: Instant,
    generation: u64,
    url: &'static str,
}

/// Timers and in-flight work owned by the service loop.
#[derive(Default)]
struct Tasks {
    refresh_at: Option<Instant>,
    probe_at: Option<PendingProbe>,
    fetch: Option<BoxFuture<'static, FetchOutcome>>,
    probe: Option<BoxFuture<'static, (u64, bool)>>,
}

enum Wake {
    Message(Option<Message>),
    RefreshDue,
    ProbeDue,
    Fetched(FetchOutcome),
    Probed((u64, bool)),
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn poll_opt<T>(slot: &mut Option<BoxFuture<'static, T>>) -> T {
    match slot.as_mut() {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}
