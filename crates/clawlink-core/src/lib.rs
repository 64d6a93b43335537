// clawlink-core: Relay connection engine, command dispatch and reactive state.

pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod sender;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::RelayClient;
pub use config::{ClientInfo, ConnectionConfig, ReconnectPolicy};
pub use connection::{ConnectionStatus, RelaySignal, RelayStats};
pub use dispatch::{CommandAction, CommandDispatcher, CommandHandler, RelayCommand, TracingHandler};
pub use error::CoreError;
pub use sender::OutboundSender;
pub use store::StateRepository;
pub use stream::{EntitySubscription, RuleSubscription, Subscription, Transition};

pub use model::{
    DeliveryOptions, EntityState, LocationReport, Motion, MuteState, Rule, RuleKind, RuleTiming,
    TrackedEntity, WifiAccessPoint,
};
