// ── Runtime connection configuration ──
//
// These types describe *how* to reach the relay. They carry the endpoint,
// the static client metadata sent on registration, and connection tuning,
// but never touch disk. The host builds a `ConnectionConfig` and hands it in.

use std::collections::BTreeMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::CoreError;

/// Static metadata describing this client, sent in every `register`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub device_model: String,
    pub app_id: String,
    pub app_version: String,
    /// Additional key/value pairs forwarded verbatim.
    pub extra: BTreeMap<String, String>,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            device_model: "unknown".into(),
            app_id: "clawlink".into(),
            app_version: env!("CARGO_PKG_VERSION").into(),
            extra: BTreeMap::new(),
        }
    }
}

impl ClientInfo {
    /// Flatten into the `info` object of a `register` message.
    pub fn to_register_info(&self) -> BTreeMap<String, String> {
        let mut info = self.extra.clone();
        info.insert("deviceModel".into(), self.device_model.clone());
        info.insert("appId".into(), self.app_id.clone());
        info.insert("appVersion".into(), self.app_version.clone());
        info
    }
}

/// Exponential reconnect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// First delay after a drop, and the value restored on success. Default: 5s.
    pub base_delay: Duration,
    /// Upper bound on the delay. Default: 60s.
    pub max_delay: Duration,
    /// Consecutive failures before the unreachable signal fires. Default: 3.
    pub unreachable_after: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            unreachable_after: 3,
        }
    }
}

/// Everything needed for one connection attempt. Immutable once built.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Relay endpoint (`ws://` or `wss://`).
    pub url: Url,
    pub client: ClientInfo,
    /// Push-delivery token forwarded on registration.
    pub push_token: Option<SecretString>,
    pub reconnect: ReconnectPolicy,
    /// Upper bound on the transport handshake.
    pub connect_timeout: Duration,
    /// WebSocket-level ping interval. `None` disables keepalive pings.
    pub keepalive: Option<Duration>,
    /// Drop the connection when nothing arrives for this long.
    pub idle_timeout: Option<Duration>,
}

impl ConnectionConfig {
    /// Config for `url` with default client info and tuning.
    pub fn new(url: Url) -> Result<Self, CoreError> {
        match url.scheme() {
            "ws" | "wss" => Ok(Self {
                url,
                client: ClientInfo::default(),
                push_token: None,
                reconnect: ReconnectPolicy::default(),
                connect_timeout: Duration::from_secs(10),
                keepalive: Some(Duration::from_secs(30)),
                idle_timeout: None,
            }),
            other => Err(CoreError::Config {
                message: format!("relay URL must use ws or wss, got '{other}'"),
            }),
        }
    }

    pub fn push_token(&self) -> Option<&str> {
        self.push_token.as_ref().map(<SecretString as ExposeSecret<str>>::expose_secret)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_secs(5));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert_eq!(policy.unreachable_after, 3);
    }

    #[test]
    fn rejects_http_urls() {
        let url = Url::parse("http://relay.local:18790").unwrap();
        assert!(matches!(
            ConnectionConfig::new(url),
            Err(CoreError::Config { .. })
        ));
    }

    #[test]
    fn register_info_includes_static_fields() {
        let mut client = ClientInfo {
            device_model: "Pixel 8".into(),
            ..ClientInfo::default()
        };
        client.extra.insert("os".into(), "android-15".into());

        let info = client.to_register_info();
        assert_eq!(info["deviceModel"], "Pixel 8");
        assert_eq!(info["appId"], "clawlink");
        assert_eq!(info["os"], "android-15");
    }
}
