// ── Relay wire protocol ──
//
// JSON-object-per-frame, discriminated by `type`.

mod codec;
mod message;
mod types;

pub use codec::{decode, encode};
pub use message::{
    CommandFrame, EntityChangedFrame, InboundMessage, OutboundMessage, SnapshotFrame, tags,
};
pub use types::{LocationFix, WireDelivery, WireEntity, WireMute, WireNamedLocation, WireRule};
