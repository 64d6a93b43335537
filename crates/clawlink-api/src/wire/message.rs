// Typed relay messages
//
// Every frame on the relay socket is one JSON object whose `type` field
// selects the variant. Inbound frames are decoded by hand in `codec.rs`
// so that unknown tags and sloppy payloads degrade gracefully; outbound
// frames are plain serde-tagged enums.

use std::collections::BTreeMap;

use serde::Serialize;

use super::types::{LocationFix, WireEntity, WireMute, WireNamedLocation, WireRule};

// ── Inbound ──────────────────────────────────────────────────────────

/// A message pushed by the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Registration accepted; carries the server-assigned client id.
    Welcome { client_id: Option<String> },
    /// Liveness probe; must be answered with [`OutboundMessage::Pong`].
    Ping,
    /// A command to execute locally.
    Command(CommandFrame),
    /// Full state bootstrap (`cat_state_snapshot`).
    Snapshot(SnapshotFrame),
    /// Single-entity state push (`cat_state_changed`).
    EntityChanged(EntityChangedFrame),
    /// Server-initiated mute update.
    MuteState(WireMute),
    /// Acknowledgement of our own `set_mute`.
    MuteAck(WireMute),
    /// Full replacement of the rule list after a CRUD round trip.
    RulesChanged(Vec<WireRule>),
    /// A tag this client does not understand. Dropped by the caller.
    Unknown { kind: String },
}

impl InboundMessage {
    /// The wire tag this message was decoded from.
    pub fn kind(&self) -> &str {
        match self {
            Self::Welcome { .. } => tags::WELCOME,
            Self::Ping => tags::PING,
            Self::Command(_) => tags::COMMAND,
            Self::Snapshot(_) => tags::SNAPSHOT,
            Self::EntityChanged(_) => tags::ENTITY_CHANGED,
            Self::MuteState(_) => tags::MUTE_STATE,
            Self::MuteAck(_) => tags::MUTE_ACK,
            Self::RulesChanged(_) => tags::RULES_CHANGED,
            Self::Unknown { kind } => kind,
        }
    }
}

/// Body of a `command` message.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFrame {
    pub action: String,
    /// Human-readable text; empty when absent.
    pub message: String,
    /// When present, must be echoed back in an `ack`.
    pub command_id: Option<String>,
    /// The complete raw object, for handlers that need extra fields.
    pub extras: serde_json::Map<String, serde_json::Value>,
}

/// Body of a `cat_state_snapshot` message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotFrame {
    pub entities: BTreeMap<String, WireEntity>,
    pub rules: Vec<WireRule>,
    /// Epoch ms at which the most recent entity went outside.
    pub last_outside_at: Option<i64>,
    pub mute: Option<WireMute>,
}

/// Body of a `cat_state_changed` message.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityChangedFrame {
    pub name: String,
    pub state: String,
    pub state_set_at: Option<i64>,
    /// Who caused the change; `"server"` when absent.
    pub source: String,
}

// ── Outbound ─────────────────────────────────────────────────────────

/// A message sent to the relay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OutboundMessage {
    /// First frame on every new connection.
    Register {
        info: BTreeMap<String, String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fcm_token: Option<String>,
    },
    Pong,
    Ack {
        command_id: String,
    },
    #[serde(rename = "cat_state_update")]
    EntityUpdate {
        cat_name: String,
        state: String,
    },
    /// `until: null` unmutes.
    SetMute {
        until: Option<i64>,
    },
    AddRule {
        rule: WireRule,
    },
    UpdateRule {
        rule: WireRule,
    },
    RemoveRule {
        id: String,
    },
    RequestTestPing,
    LocationUpdate(LocationFix),
    SaveNamedLocation {
        location: WireNamedLocation,
    },
    SetLocationTracking {
        enabled: bool,
    },
}

impl OutboundMessage {
    /// The wire tag this message encodes to.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Pong => "pong",
            Self::Ack { .. } => "ack",
            Self::EntityUpdate { .. } => "cat_state_update",
            Self::SetMute { .. } => "set_mute",
            Self::AddRule { .. } => "add_rule",
            Self::UpdateRule { .. } => "update_rule",
            Self::RemoveRule { .. } => "remove_rule",
            Self::RequestTestPing => "request_test_ping",
            Self::LocationUpdate(_) => "location_update",
            Self::SaveNamedLocation { .. } => "save_named_location",
            Self::SetLocationTracking { .. } => "set_location_tracking",
        }
    }
}

/// Inbound `type` tags.
pub mod tags {
    pub const WELCOME: &str = "welcome";
    pub const PING: &str = "ping";
    pub const COMMAND: &str = "command";
    pub const SNAPSHOT: &str = "cat_state_snapshot";
    pub const ENTITY_CHANGED: &str = "cat_state_changed";
    pub const MUTE_STATE: &str = "mute_state";
    pub const MUTE_ACK: &str = "mute_ack";
    pub const RULES_CHANGED: &str = "rules_changed";
}
