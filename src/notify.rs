//! User notifications.
//!
//! The scheduler decides when the user must be told something; a
//! [`Notifier`] decides how. The desktop shell plugs in its own; the
//! binary logs them.

use crate::providers::ProviderId;

const APP_TITLE: &str = "Weather Indicator";

/// Something the user has to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A manual refresh came too soon after the previous one
    ManualRefreshIgnored,
    /// Every provider rate-limited us; `provider` was the last one tried
    RateLimited { provider: ProviderId },
    /// Fetching cannot work with the current settings
    Misconfigured(String),
}

impl Notification {
    pub fn title(&self) -> &'static str {
        match self {
            Notification::ManualRefreshIgnored => APP_TITLE,
            Notification::RateLimited { .. } => "Too Many Requests",
            Notification::Misconfigured(_) => "Weather Indicator: Configuration Error",
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notification::ManualRefreshIgnored => {
                "Manual refreshes less than 2 minutes apart are ignored!".to_string()
            }
            Notification::RateLimited { provider } => format!(
                "Provider {} has too many users. Try switching weather providers in settings.",
                provider
            ),
            Notification::Misconfigured(message) => message.clone(),
        }
    }
}

/// Delivers notifications to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        tracing::warn!("{}: {}", notification.title(), notification.body());
    }
}
