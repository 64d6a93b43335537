// ── Wire ↔ domain conversion ──
//
// Bridges the raw relay payloads in `clawlink_api::wire` to the canonical
// domain types. Timestamps travel as epoch milliseconds and become
// `DateTime<Utc>`; rule kinds and entity states are normalised here.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use clawlink_api::wire::{
    LocationFix, WireDelivery, WireEntity, WireMute, WireNamedLocation, WireRule,
};

use crate::model::{
    DEFAULT_INITIAL_DELAY_MINUTES, DEFAULT_MAX_DELAY_MINUTES, DEFAULT_RULE_MESSAGE,
    DeliveryOptions, EntityState, LocationReport, MuteState, Rule, RuleKind, RuleTiming,
    TrackedEntity, parse_hh_mm,
};

// ── Timestamps ───────────────────────────────────────────────────────

pub(crate) fn from_millis(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}

pub(crate) fn to_millis(at: Option<DateTime<Utc>>) -> Option<i64> {
    at.as_ref().map(DateTime::timestamp_millis)
}

// ── Entities ─────────────────────────────────────────────────────────

pub(crate) fn entity_from_wire(name: String, raw: WireEntity) -> TrackedEntity {
    TrackedEntity {
        name,
        state: EntityState::from_wire(raw.state.as_deref()),
        state_set_at: from_millis(raw.state_set_at),
        locked: raw.outdoor_only,
        image: raw.image,
    }
}

// ── Mute ─────────────────────────────────────────────────────────────

impl From<WireMute> for MuteState {
    fn from(raw: WireMute) -> Self {
        Self {
            until: from_millis(raw.until),
        }
    }
}

// ── Rules ────────────────────────────────────────────────────────────

impl From<WireDelivery> for DeliveryOptions {
    fn from(raw: WireDelivery) -> Self {
        Self {
            vibration: raw.vibration,
            meow: raw.meow,
            phone_sound: raw.phone_sound,
            phone_sound_uri: raw.phone_sound_uri,
            tts: raw.tts,
            bypass_silent: raw.bypass_silent,
        }
    }
}

impl From<&DeliveryOptions> for WireDelivery {
    fn from(d: &DeliveryOptions) -> Self {
        Self {
            vibration: d.vibration,
            meow: d.meow,
            phone_sound: d.phone_sound,
            phone_sound_uri: d.phone_sound_uri.clone(),
            tts: d.tts,
            bypass_silent: d.bypass_silent,
        }
    }
}

/// Convert a relay rule. Returns `None` for rule kinds this client does
/// not know; those are left out of the local view.
pub(crate) fn rule_from_wire(raw: WireRule) -> Option<Rule> {
    let kind = match raw.kind.as_deref().map(str::parse::<RuleKind>) {
        Some(Ok(kind)) => kind,
        // Rules predating the `type` field were all repeating.
        None => RuleKind::Repeating,
        Some(Err(_)) => {
            tracing::debug!(rule = %raw.id, kind = ?raw.kind, "skipping rule of unknown kind");
            return None;
        }
    };

    Some(Rule {
        id: raw.id,
        kind,
        timing: RuleTiming {
            initial_delay_minutes: raw
                .initial_delay_minutes
                .unwrap_or(DEFAULT_INITIAL_DELAY_MINUTES),
            max_delay_minutes: raw.max_delay_minutes.unwrap_or(DEFAULT_MAX_DELAY_MINUTES),
            absolute_time: raw.absolute_time.as_deref().and_then(parse_hh_mm),
        },
        message: raw
            .message
            .unwrap_or_else(|| DEFAULT_RULE_MESSAGE.to_owned()),
        delivery: raw.delivery.into(),
    })
}

impl From<&Rule> for WireRule {
    fn from(rule: &Rule) -> Self {
        let absolute = rule.kind == RuleKind::Absolute;
        Self {
            id: rule.id.clone(),
            kind: Some(rule.kind.as_wire().to_owned()),
            initial_delay_minutes: (!absolute).then_some(rule.timing.initial_delay_minutes),
            max_delay_minutes: (!absolute).then_some(rule.timing.max_delay_minutes),
            absolute_time: rule
                .timing
                .absolute_time
                .filter(|_| absolute)
                .map(|t| t.format("%H:%M").to_string()),
            message: Some(rule.message.clone()),
            delivery: (&rule.delivery).into(),
        }
    }
}

// ── Location ─────────────────────────────────────────────────────────

impl From<&LocationReport> for LocationFix {
    fn from(report: &LocationReport) -> Self {
        let bssids: Vec<String> = report.wifi.iter().map(|ap| ap.bssid.clone()).collect();
        let rssi: BTreeMap<String, i32> = report
            .wifi
            .iter()
            .map(|ap| (ap.bssid.clone(), ap.rssi))
            .collect();

        Self {
            lat: report.lat,
            lng: report.lng,
            accuracy: report.accuracy,
            altitude: report.altitude,
            wifi_scan: (!bssids.is_empty()).then_some(bssids),
            wifi_rssi: (!rssi.is_empty()).then_some(rssi),
            motion: report.motion.to_string(),
            timestamp: report.timestamp.timestamp_millis(),
        }
    }
}

pub(crate) fn named_location(name: &str, report: &LocationReport) -> WireNamedLocation {
    WireNamedLocation {
        name: name.to_owned(),
        lat: report.lat,
        lng: report.lng,
        radius_m: report.named_radius_m(),
        wifi_fingerprint: report.wifi.iter().map(|ap| ap.bssid.clone()).collect(),
    }
}
