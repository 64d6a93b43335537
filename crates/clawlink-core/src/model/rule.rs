// ── Notification rule domain types ──
//
// Rules are evaluated by the relay. The client only displays them and
// sends CRUD requests; it never mutates its local copy directly.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::CoreError;

pub const DEFAULT_INITIAL_DELAY_MINUTES: u32 = 60;
pub const DEFAULT_MAX_DELAY_MINUTES: u32 = 240;
pub const DEFAULT_RULE_MESSAGE: &str = "{cats} have been outside.";

/// How a rule decides when to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum RuleKind {
    /// Fires `initial_delay` after the last entity went outside, then
    /// doubles the interval up to `max_delay`.
    #[strum(to_string = "repeating", serialize = "relative")]
    Repeating,
    /// Fires once a day at a wall-clock time while anything is outside.
    Absolute,
}

impl RuleKind {
    /// Tag used on the wire.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Repeating => "repeating",
            Self::Absolute => "absolute",
        }
    }
}

/// Timing parameters. Which fields matter depends on [`RuleKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTiming {
    pub initial_delay_minutes: u32,
    pub max_delay_minutes: u32,
    pub absolute_time: Option<NaiveTime>,
}

impl Default for RuleTiming {
    fn default() -> Self {
        Self {
            initial_delay_minutes: DEFAULT_INITIAL_DELAY_MINUTES,
            max_delay_minutes: DEFAULT_MAX_DELAY_MINUTES,
            absolute_time: None,
        }
    }
}

/// Independent delivery flags plus one priority flag.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeliveryOptions {
    pub vibration: bool,
    pub meow: bool,
    pub phone_sound: bool,
    pub phone_sound_uri: Option<String>,
    pub tts: bool,
    /// Play through the alarm stream even in silent mode.
    pub bypass_silent: bool,
}

impl DeliveryOptions {
    /// `true` if at least one delivery channel is enabled.
    pub fn any(&self) -> bool {
        self.vibration || self.meow || self.phone_sound || self.tts
    }
}

/// A server-evaluated notification rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub kind: RuleKind,
    pub timing: RuleTiming,
    /// Message template; `{cats}` is expanded by the relay.
    pub message: String,
    pub delivery: DeliveryOptions,
}

impl Rule {
    /// A new repeating rule with a fresh id and the stock defaults.
    pub fn repeating(initial_delay_minutes: u32, max_delay_minutes: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: RuleKind::Repeating,
            timing: RuleTiming {
                initial_delay_minutes,
                max_delay_minutes,
                absolute_time: None,
            },
            message: DEFAULT_RULE_MESSAGE.into(),
            delivery: DeliveryOptions {
                tts: true,
                phone_sound: true,
                ..DeliveryOptions::default()
            },
        }
    }

    /// A new absolute rule firing daily at `at`.
    pub fn absolute(at: NaiveTime) -> Self {
        Self {
            kind: RuleKind::Absolute,
            timing: RuleTiming {
                absolute_time: Some(at),
                ..RuleTiming::default()
            },
            ..Self::repeating(DEFAULT_INITIAL_DELAY_MINUTES, DEFAULT_MAX_DELAY_MINUTES)
        }
    }

    /// Reject rules the relay could never evaluate.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.trim().is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "rule id must not be empty".into(),
            });
        }

        match self.kind {
            RuleKind::Absolute if self.timing.absolute_time.is_none() => {
                Err(CoreError::ValidationFailed {
                    message: format!("absolute rule '{}' needs an HH:MM time", self.id),
                })
            }
            RuleKind::Repeating
                if self.timing.initial_delay_minutes > self.timing.max_delay_minutes =>
            {
                Err(CoreError::ValidationFailed {
                    message: format!(
                        "rule '{}': initial delay ({}m) exceeds max delay ({}m)",
                        self.id, self.timing.initial_delay_minutes, self.timing.max_delay_minutes
                    ),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Parse a wall-clock `"HH:MM"` string.
pub fn parse_hh_mm(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}
