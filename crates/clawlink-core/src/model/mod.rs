// ── Domain model ──

mod entity;
mod location;
mod mute;
mod rule;

pub use entity::{EntityState, TrackedEntity};
pub use location::{
    DEFAULT_NAMED_RADIUS_M, LocationReport, MIN_NAMED_RADIUS_M, Motion, WifiAccessPoint,
};
pub use mute::MuteState;
pub use rule::{
    DEFAULT_INITIAL_DELAY_MINUTES, DEFAULT_MAX_DELAY_MINUTES, DEFAULT_RULE_MESSAGE,
    DeliveryOptions, Rule, RuleKind, RuleTiming, parse_hh_mm,
};
