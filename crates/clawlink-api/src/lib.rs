// clawlink-api: Wire protocol and transport for the Claw relay.

pub mod error;
pub mod transport;
pub mod wire;

pub use error::{DecodeError, Error};
pub use transport::{Connector, Link, LinkEvent, WsConfig, WsConnector};
pub use wire::{InboundMessage, OutboundMessage, decode, encode};
