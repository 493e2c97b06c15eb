//! Network reachability tracking.
//!
//! Each network-changed signal starts a new check generation. Results
//! carry the generation they were started for, so a check superseded by a
//! newer signal cannot affect the current state. The network counts as
//! down until a check or a fetch proves otherwise.

use std::time::Duration;

/// Delay before the first check after a network change.
pub const FIRST_CHECK_DELAY: Duration = Duration::from_millis(1250);

/// Delays between failed checks before giving up.
pub const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(10),
    Duration::from_secs(30),
    Duration::from_secs(60),
];

/// What to do after a reachability result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Reachable again after being offline
    Reconnected,
    /// Reachable, and it was before the signal
    StillConnected,
    /// Check again after the delay
    Retry(Duration),
    /// Stop checking until the next network change
    GaveUp,
    /// Result of an outdated check
    Superseded,
}

#[derive(Debug, Clone, Default)]
pub struct Connectivity {
    connected: bool,
    generation: u64,
    failures: usize,
}

impl Connectivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a new check generation. Returns the generation and the delay
    /// before its first check.
    pub fn network_changed(&mut self) -> (u64, Duration) {
        self.generation += 1;
        self.failures = 0;
        (self.generation, FIRST_CHECK_DELAY)
    }

    /// Apply a check result.
    pub fn probe_result(&mut self, generation: u64, reachable: bool) -> ProbeOutcome {
        if generation != self.generation {
            return ProbeOutcome::Superseded;
        }

        if reachable {
            let was_connected = self.connected;
            self.connected = true;
            self.failures = 0;
            return if was_connected {
                ProbeOutcome::StillConnected
            } else {
                ProbeOutcome::Reconnected
            };
        }

        self.connected = false;
        match RETRY_DELAYS.get(self.failures) {
            Some(delay) => {
                self.failures += 1;
                ProbeOutcome::Retry(*delay)
            }
            None => ProbeOutcome::GaveUp,
        }
    }

    /// A fetch went through, so the network is up.
    pub fn mark_connected(&mut self) {
        self.connected = true;
    }

    /// Invalidate outstanding checks.
    pub fn cancel(&mut self) {
        self.generation += 1;
    }
}
