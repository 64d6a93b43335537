mod cli;
mod commands;
mod error;
mod log_buffer;
mod sink;

use std::ffi::OsStr;
use std::path::Path;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use clawlink_core::ConnectionConfig;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::commands::{Context, config_cmd};
use crate::error::CliError;
use crate::log_buffer::LogBuffer;

/// Targets captured by the in-memory buffer and the log file, whatever
/// the stderr verbosity.
const CAPTURE_FILTER: &str = "warn,clawlink=debug,clawlink_core=debug,clawlink_api=debug";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logs = LogBuffer::default();
    let guard = init_tracing(&cli.global, &logs);

    let result = run(cli, logs).await;

    // Flush the file writer before exiting.
    drop(guard);
    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(global: &GlobalOpts, logs: &LogBuffer) -> Option<WorkerGuard> {
    let level = match global.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr = if global.log_json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let (file, guard) = match global.log_file.as_deref() {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path.file_name().unwrap_or(OsStr::new("clawlink.log"));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(EnvFilter::new(CAPTURE_FILTER));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr.with_filter(stderr_filter))
        .with(logs.clone().with_filter(EnvFilter::new(CAPTURE_FILTER)))
        .with(file)
        .init();

    guard
}

async fn run(cli: Cli, logs: LogBuffer) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a relay
        Command::Config(args) => config_cmd::handle(args, &cli.global),

        cmd => {
            let connection = build_connection_config(&cli.global)?;
            let ctx = Context::new(connection, &cli.global, logs);

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &ctx).await
        }
    }
}

/// Config file, then environment, then `--relay-url`.
fn build_connection_config(global: &GlobalOpts) -> Result<ConnectionConfig, CliError> {
    let mut cfg = clawlink_config::load_config_from(&config_cmd::resolve_path(global))?;
    if let Some(url) = global.relay_url.as_deref() {
        cfg.set("relay_url", url)?;
    }
    Ok(clawlink_config::to_connection_config(&cfg)?)
}
