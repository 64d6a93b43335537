// ── Reconnect backoff ──
//
// Pure delay arithmetic, kept apart from the timers that consume it.

use std::time::Duration;

/// Delay after `current`: doubled, capped at `ceiling`.
pub fn next_delay(current: Duration, ceiling: Duration) -> Duration {
    current.saturating_mul(2).min(ceiling)
}

/// Exponential backoff state for one connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        let base = base.min(ceiling);
        Self {
            base,
            ceiling,
            current: base,
        }
    }

    /// The delay to wait now. Advances the sequence.
    pub fn next(&mut self) -> Duration {
        let delay = self.current;
        self.current = next_delay(self.current, self.ceiling);
        delay
    }

    /// The delay the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> Duration {
        self.current
    }

    /// Back to the base delay, after a successful registration.
    pub fn reset(&mut self) {
        self.current = self.base;
    }
}
