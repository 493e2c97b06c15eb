//! Provider rotation cursor.
//!
//! On a rate limit the scheduler moves to the next provider and retries.
//! The provider that failed first is remembered; coming back around to it
//! means every provider was tried and rotation is exhausted.

use crate::providers::ProviderId;

#[derive(Debug, Clone, Default)]
pub struct ProviderRotation {
    providers: Vec<ProviderId>,
    current: usize,
    first_failed: Option<usize>,
}

impl ProviderRotation {
    pub fn new(providers: Vec<ProviderId>) -> Self {
        Self {
            providers,
            current: 0,
            first_failed: None,
        }
    }

    /// Provider the next fetch goes to.
    pub fn current(&self) -> Option<ProviderId> {
        self.providers.get(self.current).copied()
    }

    pub fn index(&self) -> usize {
        self.current
    }

    pub fn providers(&self) -> &[ProviderId] {
        &self.providers
    }

    /// Attempts left in the current rotation cycle, counting the active
    /// provider.
    pub fn untried(&self) -> usize {
        match self.first_failed {
            Some(first) => {
                let len = self.providers.len();
                (first + len - self.current) % len
            }
            None => self.providers.len(),
        }
    }

    /// Move past a rate-limited provider.
    ///
    /// Returns the provider to retry with, or `None` once every provider
    /// failed in this cycle.
    pub fn advance(&mut self) -> Option<ProviderId> {
        let len = self.providers.len();
        if len < 2 {
            self.first_failed = None;
            return None;
        }

        let first = *self.first_failed.get_or_insert(self.current);
        self.current = (self.current + 1) % len;

        if self.current == first {
            self.first_failed = None;
            None
        } else {
            self.current()
        }
    }

    /// Forget the failure marker after a successful fetch.
    pub fn reset(&mut self) {
        self.first_failed = None;
    }

    /// Replace the provider list, keeping the active provider when it is
    /// still present.
    pub fn set_providers(&mut self, providers: Vec<ProviderId>) {
        let active = self.current();
        self.current = active
            .and_then(|id| providers.iter().position(|p| *p == id))
            .unwrap_or(0);
        self.providers = providers;
        self.first_failed = None;
    }
}
