//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use clawlink_config::ConfigError;
use clawlink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the relay at {url}: {reason}")]
    #[diagnostic(
        code(clawlink::connection_failed),
        help(
            "Check that the relay is running and reachable.\n\
             URL: {url}\n\
             Change it with: clawlink config set relay_url ws://HOST:PORT"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Not connected to the relay")]
    #[diagnostic(
        code(clawlink::not_connected),
        help("The connection dropped before the request could be sent. Try again.")
    )]
    NotConnected,

    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(clawlink::timeout),
        help("Increase the wait with --timeout or check the relay's responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(clawlink::not_found),
        help("Run: clawlink {list_command} to see what the relay knows about")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(clawlink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(clawlink::config_exists),
        help("Use --force to overwrite it, or edit single keys with: clawlink config set")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(
        code(clawlink::config),
        help("Valid keys: relay_url, push_token, device_model, app_id, app_version, reconnect.*, keepalive_secs, connect_timeout_secs, idle_timeout_secs")
    )]
    Config(#[from] ConfigError),

    // ── Relay ────────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(clawlink::relay))]
    Relay { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(clawlink::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::ConfigExists { .. } | Self::Config(_) => {
                exit_code::USAGE
            }
            Self::Relay { .. } | Self::Io(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::NotConnected | CoreError::QueueFull => CliError::NotConnected,
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::EntityNotFound { name } => CliError::NotFound {
                resource_type: "entity".into(),
                identifier: name,
                list_command: "state".into(),
            },
            CoreError::RuleNotFound { id } => CliError::NotFound {
                resource_type: "rule".into(),
                identifier: id,
                list_command: "rules list".into(),
            },
            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Config { message } => CliError::Validation {
                field: "relay_url".into(),
                reason: message,
            },
            CoreError::CommandFailed { action, message } => CliError::Relay {
                message: format!("command '{action}' failed: {message}"),
            },
            CoreError::Internal(message) => CliError::Relay { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_keep_their_exit_codes() {
        let not_found = CliError::from(CoreError::EntityNotFound { name: "Tom".into() });
        assert_eq!(not_found.exit_code(), exit_code::NOT_FOUND);
        assert!(not_found.to_string().contains("Tom"));

        let timeout = CliError::from(CoreError::Timeout { timeout_secs: 10 });
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let full = CliError::from(CoreError::QueueFull);
        assert_eq!(full.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn config_errors_are_usage_errors() {
        let err = CliError::from(ConfigError::UnknownKey { key: "colour".into() });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
