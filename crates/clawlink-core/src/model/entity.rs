// ── Tracked entity domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Where a tracked entity currently is.
///
/// Parsing is case-insensitive and never fails: anything that is not
/// `inside` or `outside` becomes [`Unknown`](Self::Unknown).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntityState {
    Inside,
    Outside,
    #[default]
    Unknown,
}

impl EntityState {
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            Some("inside") => Self::Inside,
            Some("outside") => Self::Outside,
            _ => Self::Unknown,
        }
    }

    /// Lowercase form sent to the relay.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Inside => "inside",
            Self::Outside => "outside",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_outside(self) -> bool {
        matches!(self, Self::Outside)
    }
}

/// A named thing whose inside/outside state the relay tracks.
///
/// Created when it first appears in a snapshot; never deleted locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntity {
    /// Unique key.
    pub name: String,
    pub state: EntityState,
    /// When `state` was last set, if the relay knows.
    pub state_set_at: Option<DateTime<Utc>>,
    /// Locked entities (outdoor-only) are not meant to be edited locally.
    pub locked: bool,
    /// Opaque display hint (image key or URL).
    pub image: Option<String>,
}

impl TrackedEntity {
    /// Copy of `self` with a new state and timestamp; everything else kept.
    pub fn with_state(&self, state: EntityState, state_set_at: Option<DateTime<Utc>>) -> Self {
        Self {
            state,
            state_set_at,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_parsing_is_case_insensitive_with_fallback() {
        assert_eq!(EntityState::from_wire(Some("inside")), EntityState::Inside);
        assert_eq!(EntityState::from_wire(Some("OUTSIDE")), EntityState::Outside);
        assert_eq!(EntityState::from_wire(Some("on the roof")), EntityState::Unknown);
        assert_eq!(EntityState::from_wire(None), EntityState::Unknown);
    }

    #[test]
    fn display_matches_wire_form() {
        assert_eq!(EntityState::Outside.to_string(), "outside");
        assert_eq!(EntityState::Inside.as_ref(), EntityState::Inside.as_wire());
    }
}
