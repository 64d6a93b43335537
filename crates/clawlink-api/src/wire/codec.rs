// JSON codec for relay frames
//
// `decode` never panics and never fails on unknown tags: the caller only
// sees `Err` for frames that are not JSON objects, have no `type`, or are
// missing the fields a known tag cannot live without.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::message::{
    CommandFrame, EntityChangedFrame, InboundMessage, OutboundMessage, SnapshotFrame, tags,
};
use super::types::{WireEntity, WireMute, WireRule, millis_from_value};
use crate::error::DecodeError;

/// Decode one text frame into a typed message.
pub fn decode(text: &str) -> Result<InboundMessage, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(DecodeError::Malformed("expected a JSON object".into()));
    };

    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_owned();

    let message = match kind.as_str() {
        tags::WELCOME => InboundMessage::Welcome {
            client_id: string_field(&obj, "clientId"),
        },
        tags::PING => InboundMessage::Ping,
        tags::COMMAND => InboundMessage::Command(decode_command(obj)?),
        tags::SNAPSHOT => InboundMessage::Snapshot(decode_snapshot(&obj)),
        tags::ENTITY_CHANGED => InboundMessage::EntityChanged(decode_entity_changed(&obj)?),
        tags::MUTE_STATE => InboundMessage::MuteState(mute_field(&obj)),
        tags::MUTE_ACK => InboundMessage::MuteAck(mute_field(&obj)),
        tags::RULES_CHANGED => InboundMessage::RulesChanged(rules_field(&obj)),
        _ => InboundMessage::Unknown { kind },
    };

    Ok(message)
}

/// Encode an outbound message as a JSON text frame.
///
/// Outbound messages only contain strings, numbers, booleans and
/// string-keyed maps, so serialization cannot fail in practice.
pub fn encode(message: &OutboundMessage) -> String {
    match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, kind = message.kind(), "failed to encode outbound message");
            format!(r#"{{"type":"{}"}}"#, message.kind())
        }
    }
}

// ── Per-tag decoders ─────────────────────────────────────────────────

fn decode_command(obj: Map<String, Value>) -> Result<CommandFrame, DecodeError> {
    let action = string_field(&obj, "action").ok_or_else(|| DecodeError::InvalidPayload {
        kind: tags::COMMAND.into(),
        reason: "missing 'action'".into(),
    })?;

    Ok(CommandFrame {
        action,
        message: string_field(&obj, "message").unwrap_or_default(),
        command_id: string_field(&obj, "commandId"),
        extras: obj,
    })
}

fn decode_snapshot(obj: &Map<String, Value>) -> SnapshotFrame {
    let mut entities = BTreeMap::new();
    if let Some(cats) = obj.get("cats").and_then(Value::as_object) {
        for (name, raw) in cats {
            if !raw.is_object() {
                tracing::debug!(entity = %name, "skipping non-object snapshot entry");
                continue;
            }
            match serde_json::from_value::<WireEntity>(raw.clone()) {
                Ok(entity) => {
                    entities.insert(name.clone(), entity);
                }
                Err(e) => {
                    tracing::debug!(entity = %name, error = %e, "skipping undecodable snapshot entry");
                }
            }
        }
    }

    SnapshotFrame {
        entities,
        rules: rules_field(obj),
        last_outside_at: obj.get("lastCatOutAt").and_then(millis_from_value),
        mute: obj
            .get("mute")
            .filter(|v| v.is_object())
            .and_then(|v| serde_json::from_value::<WireMute>(v.clone()).ok()),
    }
}

fn decode_entity_changed(obj: &Map<String, Value>) -> Result<EntityChangedFrame, DecodeError> {
    let invalid = |reason: &str| DecodeError::InvalidPayload {
        kind: tags::ENTITY_CHANGED.into(),
        reason: reason.into(),
    };

    Ok(EntityChangedFrame {
        name: string_field(obj, "catName").ok_or_else(|| invalid("missing 'catName'"))?,
        state: string_field(obj, "state").ok_or_else(|| invalid("missing 'state'"))?,
        state_set_at: obj.get("stateSetAt").and_then(millis_from_value),
        source: string_field(obj, "source").unwrap_or_else(|| "server".into()),
    })
}

// ── Field helpers ────────────────────────────────────────────────────

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// `{ "mute": { "until": ... } }`; a missing or odd `mute` means "not muted".
fn mute_field(obj: &Map<String, Value>) -> WireMute {
    obj.get("mute")
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value::<WireMute>(v.clone()).ok())
        .unwrap_or_default()
}

/// The `notifications` array; entries that fail to decode are skipped.
fn rules_field(obj: &Map<String, Value>) -> Vec<WireRule> {
    let Some(raw) = obj.get("notifications").and_then(Value::as_array) else {
        return Vec::new();
    };

    raw.iter()
        .filter_map(|item| match serde_json::from_value::<WireRule>(item.clone()) {
            Ok(rule) => Some(rule),
            Err(e) => {
                tracing::debug!(error = %e, "skipping undecodable rule");
                None
            }
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────
