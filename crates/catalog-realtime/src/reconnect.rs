//! Linear reconnect backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff parameters: delay for attempt `k` is `base_delay × k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay unit.
    pub base_delay: Duration,
    /// Reconnect attempts allowed per activation cycle.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Self::DEFAULT_BASE_DELAY,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Default delay unit.
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(3);
    /// Default attempt budget.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Create a policy.
    pub const fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Delay before attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Decide what follows a failure once `attempt_count` reconnects were already scheduled.
    pub fn decide(&self, attempt_count: u32) -> ReconnectDecision {
        if attempt_count >= self.max_attempts {
            return ReconnectDecision::Exhausted;
        }
        let attempt = attempt_count + 1;
        ReconnectDecision::Retry {
            attempt,
            delay: self.delay_for(attempt),
        }
    }

    /// Every delay of a full cycle, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..=self.max_attempts).map(|attempt| self.delay_for(attempt))
    }
}

/// Outcome of [`ReconnectPolicy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Schedule reconnect number `attempt` after `delay`.
    Retry {
        /// New attempt count
        attempt: u32,
        /// Wait before the attempt
        delay: Duration,
    },
    /// The budget is spent for this activation cycle.
    Exhausted,
}

/// Attempt counter plus the policy that bounds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconnectState {
    /// Reconnects scheduled since the last successful connection.
    pub attempt_count: u32,
    /// Backoff parameters.
    pub policy: ReconnectPolicy,
}

impl ReconnectState {
    /// Fresh state for `policy`.
    pub const fn new(policy: ReconnectPolicy) -> Self {
        Self {
            attempt_count: 0,
            policy,
        }
    }

    /// Next decision for the current count.
    pub fn decide(&self) -> ReconnectDecision {
        self.policy.decide(self.attempt_count)
    }
}
