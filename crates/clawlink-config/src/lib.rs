//! Persistent configuration for the clawlink relay client.
//!
//! A single TOML file, overlaid with `CLAWLINK_`-prefixed environment
//! variables, translated into a `clawlink_core::ConnectionConfig`. The
//! core never reads disk; hosts load once at startup and save on change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use clawlink_core::{ClientInfo, ConnectionConfig, ReconnectPolicy};

pub const DEFAULT_RELAY_URL: &str = "ws://localhost:18790";

/// Environment variable prefix. Nested keys use `__`, e.g.
/// `CLAWLINK_RECONNECT__BASE_DELAY_SECS`.
pub const ENV_PREFIX: &str = "CLAWLINK_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown config key '{key}'")]
    UnknownKey { key: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Relay endpoint, `ws://` or `wss://`.
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    /// Push-delivery token sent on registration (plaintext).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,

    #[serde(default = "default_device_model")]
    pub device_model: String,

    /// Overrides the built-in application id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    /// Overrides the built-in application version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    #[serde(default)]
    pub reconnect: ReconnectSettings,

    /// WebSocket ping interval; `0` disables keepalive.
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Drop the connection when the relay is silent this long.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,

    /// Extra key/value pairs forwarded in the registration info.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            push_token: None,
            device_model: default_device_model(),
            app_id: None,
            app_version: None,
            reconnect: ReconnectSettings::default(),
            keepalive_secs: default_keepalive(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: None,
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,

    /// Consecutive failures before the host is told the relay is down.
    #[serde(default = "default_unreachable_after")]
    pub unreachable_after: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay_secs: default_base_delay(),
            max_delay_secs: default_max_delay(),
            unreachable_after: default_unreachable_after(),
        }
    }
}

fn default_relay_url() -> String {
    DEFAULT_RELAY_URL.into()
}
fn default_device_model() -> String {
    format!("headless-{}", std::env::consts::OS)
}
fn default_keepalive() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_base_delay() -> u64 {
    5
}
fn default_max_delay() -> u64 {
    60
}
fn default_unreachable_after() -> u32 {
    3
}

// ── Editing ─────────────────────────────────────────────────────────

/// Keys accepted by [`Config::set`], in display order.
pub const KEYS: &[&str] = &[
    "relay_url",
    "push_token",
    "device_model",
    "app_id",
    "app_version",
    "reconnect.base_delay_secs",
    "reconnect.max_delay_secs",
    "reconnect.unreachable_after",
    "keepalive_secs",
    "connect_timeout_secs",
    "idle_timeout_secs",
];

impl Config {
    /// Set one dotted key from its string form. An empty value clears
    /// optional keys.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match key {
            "relay_url" => {
                parse_relay_url(value)?;
                self.relay_url = value.into();
            }
            "push_token" => self.push_token = optional(value),
            "device_model" => {
                if value.is_empty() {
                    return Err(invalid(key, "must not be empty"));
                }
                self.device_model = value.into();
            }
            "app_id" => self.app_id = optional(value),
            "app_version" => self.app_version = optional(value),
            "reconnect.base_delay_secs" => self.reconnect.base_delay_secs = parse_number(key, value)?,
            "reconnect.max_delay_secs" => self.reconnect.max_delay_secs = parse_number(key, value)?,
            "reconnect.unreachable_after" => {
                self.reconnect.unreachable_after = parse_number(key, value)?;
            }
            "keepalive_secs" => self.keepalive_secs = parse_number(key, value)?,
            "connect_timeout_secs" => self.connect_timeout_secs = parse_number(key, value)?,
            "idle_timeout_secs" => {
                self.idle_timeout_secs = if value.is_empty() {
                    None
                } else {
                    Some(parse_number(key, value)?)
                };
            }
            other => {
                return Err(ConfigError::UnknownKey { key: other.into() });
            }
        }
        Ok(())
    }
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| invalid(key, format!("expected a non-negative integer, got '{value}'")))
}

fn parse_relay_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw
        .parse()
        .map_err(|_| invalid("relay_url", format!("invalid URL: {raw}")))?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(invalid(
            "relay_url",
            format!("expected a ws:// or wss:// URL, got scheme '{other}'"),
        )),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "clawlink", "clawlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("clawlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the canonical path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` plus environment. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, falling back to the defaults on any error.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

/// Serialize config to TOML and write to `path`, creating parent dirs.
pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Validate the file and build the runtime `ConnectionConfig`.
pub fn to_connection_config(cfg: &Config) -> Result<ConnectionConfig, ConfigError> {
    let url = parse_relay_url(&cfg.relay_url)?;
    let reconnect = reconnect_policy(&cfg.reconnect)?;

    if cfg.connect_timeout_secs == 0 {
        return Err(invalid("connect_timeout_secs", "must be at least 1"));
    }
    if cfg.idle_timeout_secs == Some(0) {
        return Err(invalid("idle_timeout_secs", "must be at least 1 when set"));
    }

    let mut conn = ConnectionConfig::new(url).map_err(|e| invalid("relay_url", e.to_string()))?;

    let defaults = ClientInfo::default();
    conn.client = ClientInfo {
        device_model: cfg.device_model.clone(),
        app_id: cfg.app_id.clone().unwrap_or(defaults.app_id),
        app_version: cfg.app_version.clone().unwrap_or(defaults.app_version),
        extra: cfg.extra.clone(),
    };
    conn.push_token = cfg
        .push_token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(|t| SecretString::from(t.to_owned()));
    conn.reconnect = reconnect;
    conn.connect_timeout = Duration::from_secs(cfg.connect_timeout_secs);
    conn.keepalive = (cfg.keepalive_secs > 0).then(|| Duration::from_secs(cfg.keepalive_secs));
    conn.idle_timeout = cfg.idle_timeout_secs.map(Duration::from_secs);

    Ok(conn)
}

fn reconnect_policy(settings: &ReconnectSettings) -> Result<ReconnectPolicy, ConfigError> {
    if settings.base_delay_secs == 0 {
        return Err(invalid("reconnect.base_delay_secs", "must be at least 1"));
    }
    if settings.max_delay_secs < settings.base_delay_secs {
        return Err(invalid(
            "reconnect.max_delay_secs",
            format!(
                "must not be below base_delay_secs ({})",
                settings.base_delay_secs
            ),
        ));
    }
    if settings.unreachable_after == 0 {
        return Err(invalid("reconnect.unreachable_after", "must be at least 1"));
    }

    Ok(ReconnectPolicy {
        base_delay: Duration::from_secs(settings.base_delay_secs),
        max_delay: Duration::from_secs(settings.max_delay_secs),
        unreachable_after: settings.unreachable_after,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_translate_to_core_defaults() {
        let conn = to_connection_config(&Config::default()).unwrap();
        assert_eq!(conn.url.as_str(), "ws://localhost:18790/");
        assert_eq!(conn.reconnect, ReconnectPolicy::default());
        assert_eq!(conn.keepalive, Some(Duration::from_secs(30)));
        assert_eq!(conn.connect_timeout, Duration::from_secs(10));
        assert!(conn.idle_timeout.is_none());
        assert!(conn.push_token().is_none());
        assert_eq!(conn.client.app_id, "clawlink");
    }

    #[test]
    fn overrides_are_carried_over() {
        let mut cfg = Config::default();
        cfg.set("relay_url", "wss://relay.example.com/ws").unwrap();
        cfg.set("push_token", "tok-1").unwrap();
        cfg.set("device_model", "Pi 5").unwrap();
        cfg.set("keepalive_secs", "0").unwrap();
        cfg.set("idle_timeout_secs", "90").unwrap();
        cfg.set("reconnect.max_delay_secs", "120").unwrap();

        let conn = to_connection_config(&cfg).unwrap();
        assert_eq!(conn.url.scheme(), "wss");
        assert_eq!(conn.push_token(), Some("tok-1"));
        assert_eq!(conn.client.device_model, "Pi 5");
        assert!(conn.keepalive.is_none());
        assert_eq!(conn.idle_timeout, Some(Duration::from_secs(90)));
        assert_eq!(conn.reconnect.max_delay, Duration::from_secs(120));
    }

    #[test]
    fn empty_value_clears_optional_keys() {
        let mut cfg = Config::default();
        cfg.set("push_token", "tok-1").unwrap();
        cfg.set("push_token", "").unwrap();
        cfg.set("idle_timeout_secs", "").unwrap();
        assert!(cfg.push_token.is_none());
        assert!(cfg.idle_timeout_secs.is_none());
    }

    #[test]
    fn set_rejects_bad_input() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("relay_url", "https://relay.example.com"),
            Err(ConfigError::Validation { .. })
        ));
        assert!(matches!(
            cfg.set("keepalive_secs", "-1"),
            Err(ConfigError::Validation { .. })
        ));
        assert!(matches!(
            cfg.set("colour", "blue"),
            Err(ConfigError::UnknownKey { .. })
        ));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn every_listed_key_is_settable() {
        for key in KEYS {
            let mut cfg = Config::default();
            let value = match *key {
                "relay_url" => "ws://10.0.0.2:18790",
                "push_token" | "device_model" | "app_id" | "app_version" => "x",
                _ => "7",
            };
            cfg.set(key, value).unwrap();
        }
    }

    #[test]
    fn inconsistent_reconnect_settings_are_rejected() {
        let mut cfg = Config::default();
        cfg.reconnect.base_delay_secs = 30;
        cfg.reconnect.max_delay_secs = 10;
        let err = to_connection_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("reconnect.max_delay_secs"));

        cfg.reconnect = ReconnectSettings {
            unreachable_after: 0,
            ..ReconnectSettings::default()
        };
        assert!(to_connection_config(&cfg).is_err());
    }

    #[test]
    fn blank_push_token_is_not_sent() {
        let cfg = Config {
            push_token: Some("   ".into()),
            ..Config::default()
        };
        assert!(to_connection_config(&cfg).unwrap().push_token().is_none());
    }
}
