// ── Observable connection state ──

use std::time::Duration;

use strum::{AsRefStr, Display};

/// Connection state observable by consumers. Exactly one is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    /// Registered with the relay; sends are accepted.
    Registered,
    /// Waiting out a backoff delay before the next attempt.
    Reconnecting,
}

impl ConnectionStatus {
    pub fn is_registered(self) -> bool {
        matches!(self, Self::Registered)
    }
}

/// Out-of-band notifications for external collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelaySignal {
    /// The relay greeted this client after registration.
    Registered { client_id: Option<String> },
    /// Raised once per failure streak, after the configured number of
    /// consecutive failed or dropped connections.
    PersistentlyUnreachable { consecutive_failures: u32 },
}

/// Diagnostics snapshot of the connection engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayStats {
    pub status: ConnectionStatus,
    /// Failed or dropped connections since the last registration.
    pub consecutive_failures: u32,
    /// Delay the next reconnect will wait.
    pub next_backoff: Duration,
    /// Stamp of the current connection lifecycle. Bumped by every
    /// `connect()` and `disconnect()`.
    pub epoch: u64,
    /// Server-assigned id from the last `welcome`.
    pub client_id: Option<String>,
}
