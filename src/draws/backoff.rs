use std::time::Duration;

/// Exponential backoff bounds for one polling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub ceiling: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        BackoffPolicy {
            base,
            ceiling: ceiling.max(base),
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            base: Duration::from_secs(5 * 60),
            ceiling: Duration::from_secs(30 * 60),
        }
    }
}

/// Backoff state. Starts at the base delay, doubles after every step and
/// never shrinks; a fresh run needs a fresh `Backoff`.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Backoff {
            policy,
            current: policy.base,
        }
    }

    /// Return the delay to sleep now and advance the state.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .checked_mul(2)
            .unwrap_or(self.policy.ceiling)
            .min(self.policy.ceiling);
        delay
    }
}
