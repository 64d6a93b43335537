// ── Notification mute state ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-side suppression of rule notifications.
///
/// `until: None` means not muted. A mute whose deadline has passed is
/// inactive even before the relay sends a fresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MuteState {
    pub until: Option<DateTime<Utc>>,
}

impl MuteState {
    pub fn until(until: DateTime<Utc>) -> Self {
        Self { until: Some(until) }
    }

    pub fn unmuted() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.until.is_some_and(|until| now < until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn activity_depends_on_deadline() {
        let now = Utc::now();
        assert!(!MuteState::unmuted().is_active_at(now));
        assert!(MuteState::until(now + Duration::minutes(5)).is_active_at(now));
        assert!(!MuteState::until(now - Duration::minutes(5)).is_active_at(now));
        assert!(!MuteState::until(now).is_active_at(now));
    }
}
