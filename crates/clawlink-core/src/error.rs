// ── Core error types ──
//
// User-facing errors from clawlink-core. Consumers never see raw socket
// or JSON errors; the `From<clawlink_api::Error>` impl translates
// transport-layer failures into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to relay at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// No registered connection; the message was not sent.
    #[error("Not connected to the relay")]
    NotConnected,

    #[error("Relay connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The outbound queue is full; the message was not sent.
    #[error("Outbound queue is full")]
    QueueFull,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Entity not found: {name}")]
    EntityNotFound { name: String },

    #[error("Rule not found: {id}")]
    RuleNotFound { id: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Command errors ───────────────────────────────────────────────
    /// A side-effect handler could not carry out a command.
    #[error("Command '{action}' failed: {message}")]
    CommandFailed { action: String, message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` for failures that a later reconnect can resolve.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::NotConnected | Self::Timeout { .. } | Self::QueueFull
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<clawlink_api::Error> for CoreError {
    fn from(err: clawlink_api::Error) -> Self {
        match err {
            clawlink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid relay URL: {e}"),
            },
            clawlink_api::Error::UnsupportedScheme { scheme } => CoreError::Config {
                message: format!("Unsupported relay URL scheme '{scheme}' (expected ws or wss)"),
            },
            clawlink_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            clawlink_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            clawlink_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            clawlink_api::Error::LinkClosed => CoreError::NotConnected,
            clawlink_api::Error::Decode(e) => CoreError::Internal(format!("Decode error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_map_to_domain_variants() {
        let err: CoreError = clawlink_api::Error::Timeout { timeout_secs: 10 }.into();
        assert!(matches!(err, CoreError::Timeout { timeout_secs: 10 }));
        assert!(err.is_transient());

        let err: CoreError = clawlink_api::Error::UnsupportedScheme {
            scheme: "http".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Config { .. }));
        assert!(!err.is_transient());

        let err: CoreError = clawlink_api::Error::LinkClosed.into();
        assert!(matches!(err, CoreError::NotConnected));
    }
}
