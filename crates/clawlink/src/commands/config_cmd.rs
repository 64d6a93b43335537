//! Config subcommand handlers. None of these touch the relay.

use std::path::PathBuf;

use clawlink_config::{self as config, Config};

use super::print_json;
use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

const MASK: &str = "********";

/// The file `--config` points at, or the platform default.
pub fn resolve_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config::config_path)
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = resolve_path(global);

    match args.command {
        ConfigCommand::Show => {
            let cfg = masked(config::load_config_from(&path)?);
            if global.json {
                return print_json(&cfg);
            }
            print!("{}", toml::to_string_pretty(&cfg).map_err(config::ConfigError::from)?);
        }

        ConfigCommand::Path => println!("{}", path.display()),

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            let mut cfg = Config::default();
            if let Some(url) = global.relay_url.as_deref() {
                cfg.set("relay_url", url)?;
            }
            config::to_connection_config(&cfg)?;
            config::save_config_to(&path, &cfg)?;
            eprintln!("wrote {}", path.display());
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_from(&path)?;
            cfg.set(&key, &value)?;
            config::to_connection_config(&cfg)?;
            config::save_config_to(&path, &cfg)?;
            eprintln!("{key} updated in {}", path.display());
        }
    }
    Ok(())
}

fn masked(mut cfg: Config) -> Config {
    if cfg.push_token.is_some() {
        cfg.push_token = Some(MASK.into());
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_token_is_masked() {
        let cfg = Config {
            push_token: Some("fcm-secret".into()),
            ..Config::default()
        };
        assert_eq!(masked(cfg).push_token.as_deref(), Some(MASK));
        assert_eq!(masked(Config::default()).push_token, None);
    }
}
