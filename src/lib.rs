//! Weather Indicator - Desktop Weather Panel Core
//!
//! Fetches current conditions and a 3-hour forecast from interchangeable
//! weather providers, keeps the latest result cached, and formats it in
//! the user's units and locale. Refreshing, provider rotation on rate
//! limits and network reachability are handled by the refresh scheduler.

pub mod client;
pub mod location;
pub mod notify;
pub mod providers;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod units;
pub mod weather;

// Re-export commonly used types
pub use client::{FetchOutcome, WeatherClient};
pub use providers::{ProviderId, ProviderRegistry, WeatherProvider};
pub use scheduler::{CacheEntry, RefreshScheduler};
pub use service::{ServiceHandle, WeatherService};
pub use storage::config::{IndicatorSettings, SettingsStore};
pub use units::Formatter;
pub use weather::{ForecastTimeline, WeatherSnapshot};
