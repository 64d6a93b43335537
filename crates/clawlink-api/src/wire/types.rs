// Relay wire payload types
//
// Raw shapes for the objects nested inside relay messages. Inbound fields
// are decoded leniently: the relay is a small Node service whose payloads
// drift between versions, so absent or mistyped optional fields fall back
// to defaults instead of failing the whole frame.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

// ── Lenient field helpers ────────────────────────────────────────────

/// Epoch-millisecond timestamp that may arrive as an integer, a float,
/// `null`, or something else entirely. Anything non-numeric is `None`.
pub(crate) fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(millis_from_value))
}

/// Boolean flag where anything other than a JSON `true` is `false`.
pub(crate) fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_bool()).unwrap_or(false))
}

/// Optional string where non-string values are treated as absent.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_str().map(str::to_owned)))
}

/// Optional minute count; negative or fractional values are rounded into range.
pub(crate) fn lenient_minutes<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(millis_from_value).map(|m| {
        u32::try_from(m.max(0)).unwrap_or(u32::MAX)
    }))
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub(crate) fn millis_from_value(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

// ── Tracked entity ───────────────────────────────────────────────────

/// One entry of the snapshot's `cats` map (the map key is the name).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEntity {
    /// `"inside"` / `"outside"`; anything else means unknown.
    #[serde(default, deserialize_with = "lenient_string")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub state_set_at: Option<i64>,
    /// Locked entities cannot be edited from the client UI.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub outdoor_only: bool,
    /// Opaque display hint (image key or URL).
    #[serde(default, deserialize_with = "lenient_string")]
    pub image: Option<String>,
}

// ── Rules ────────────────────────────────────────────────────────────

/// Delivery flags for a rule. Any combination may be enabled.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDelivery {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub vibration: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub meow: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub phone_sound: bool,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone_sound_uri: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub tts: bool,
    /// Play through the alarm stream even when the phone is silenced.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub bypass_silent: bool,
}

/// A notification rule as the relay stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRule {
    pub id: String,
    /// `"repeating"` (alias `"relative"`) or `"absolute"`.
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_minutes",
        skip_serializing_if = "Option::is_none"
    )]
    pub initial_delay_minutes: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient_minutes",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_delay_minutes: Option<u32>,
    /// `"HH:MM"` for absolute rules.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub absolute_time: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub message: Option<String>,
    #[serde(default)]
    pub delivery: WireDelivery,
}

// ── Mute ─────────────────────────────────────────────────────────────

/// `{ "until": <epoch ms> | null }`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMute {
    #[serde(default, deserialize_with = "lenient_millis")]
    pub until: Option<i64>,
}

// ── Location ─────────────────────────────────────────────────────────

/// A single location fix reported to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub lat: f64,
    pub lng: f64,
    pub accuracy: Option<f32>,
    pub altitude: Option<f64>,
    /// BSSIDs seen in the last Wi-Fi scan.
    pub wifi_scan: Option<Vec<String>>,
    /// BSSID to signal strength in dBm.
    pub wifi_rssi: Option<BTreeMap<String, i32>>,
    /// `"walking"`, `"stationary"` or `"unknown"`.
    pub motion: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// A place the relay should learn to recognise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNamedLocation {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub radius_m: f64,
    pub wifi_fingerprint: Vec<String>,
}
