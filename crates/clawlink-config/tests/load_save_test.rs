#![allow(clippy::unwrap_used)]
// File and environment round trips for clawlink-config.

use std::path::Path;

use figment::Jail;
use pretty_assertions::assert_eq;

use clawlink_config::{Config, load_config_from, save_config_to, to_connection_config};

#[test]
fn test_missing_file_yields_defaults() {
    Jail::expect_with(|_jail| {
        let cfg = load_config_from(Path::new("does-not-exist.toml")).map_err(|e| e.to_string())?;
        assert_eq!(cfg, Config::default());
        Ok(())
    });
}

#[test]
fn test_file_values_override_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "clawlink.toml",
            r#"
                relay_url = "wss://relay.home.arpa:18790"
                device_model = "kitchen-pi"
                idle_timeout_secs = 120

                [reconnect]
                max_delay_secs = 300
            "#,
        )?;

        let cfg = load_config_from(Path::new("clawlink.toml")).map_err(|e| e.to_string())?;
        assert_eq!(cfg.relay_url, "wss://relay.home.arpa:18790");
        assert_eq!(cfg.device_model, "kitchen-pi");
        assert_eq!(cfg.idle_timeout_secs, Some(120));
        assert_eq!(cfg.reconnect.max_delay_secs, 300);
        assert_eq!(cfg.reconnect.base_delay_secs, 5);
        assert_eq!(cfg.keepalive_secs, 30);
        Ok(())
    });
}

#[test]
fn test_env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file("clawlink.toml", r#"relay_url = "ws://from-file:1""#)?;
        jail.set_env("CLAWLINK_RELAY_URL", "ws://from-env:2");
        jail.set_env("CLAWLINK_PUSH_TOKEN", "env-token");
        jail.set_env("CLAWLINK_RECONNECT__UNREACHABLE_AFTER", "5");

        let cfg = load_config_from(Path::new("clawlink.toml")).map_err(|e| e.to_string())?;
        assert_eq!(cfg.relay_url, "ws://from-env:2");
        assert_eq!(cfg.push_token.as_deref(), Some("env-token"));
        assert_eq!(cfg.reconnect.unreachable_after, 5);
        Ok(())
    });
}

#[test]
fn test_malformed_file_is_an_error() {
    Jail::expect_with(|jail| {
        jail.create_file("clawlink.toml", "relay_url = [")?;
        assert!(load_config_from(Path::new("clawlink.toml")).is_err());
        Ok(())
    });
}

#[test]
fn test_save_then_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut cfg = Config::default();
    cfg.set("relay_url", "wss://relay.example.com/ws").unwrap();
    cfg.set("push_token", "secret-token").unwrap();
    cfg.set("reconnect.base_delay_secs", "2").unwrap();
    cfg.extra.insert("room".into(), "hallway".into());

    save_config_to(&path, &cfg).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("relay_url = \"wss://relay.example.com/ws\""));
    assert!(text.contains("[reconnect]"));
    assert!(!text.contains("idle_timeout_secs"));

    let loaded = load_config_from(&path).unwrap();
    assert_eq!(loaded, cfg);

    let conn = to_connection_config(&loaded).unwrap();
    assert_eq!(conn.client.to_register_info()["room"], "hallway");
}
