//! Command handlers and the one-shot session helper they share.

pub mod config_cmd;
pub mod location;
pub mod mute;
pub mod rules;
pub mod run;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use clawlink_core::{ConnectionConfig, ConnectionStatus, CoreError, RelayClient, TracingHandler};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::log_buffer::LogBuffer;

/// What every relay-facing command needs.
pub struct Context {
    pub connection: ConnectionConfig,
    pub wait: Duration,
    pub json: bool,
    pub logs: LogBuffer,
}

impl Context {
    pub fn new(connection: ConnectionConfig, global: &GlobalOpts, logs: LogBuffer) -> Self {
        Self {
            connection,
            wait: Duration::from_secs(global.timeout.max(1)),
            json: global.json,
            logs,
        }
    }
}

pub async fn dispatch(cmd: Command, ctx: &Context) -> Result<(), CliError> {
    match cmd {
        Command::Run(args) => run::handle(args, ctx).await,
        Command::State => state::show(ctx).await,
        Command::Set(args) => state::set(args, ctx).await,
        Command::Mute(args) => mute::handle(args, ctx).await,
        Command::Rules(args) => rules::handle(args, ctx).await,
        Command::Location(args) => location::handle(args, ctx).await,
        Command::TestPing => {
            one_shot(ctx, RelayClient::request_test_ping).await?;
            eprintln!("test ping requested");
            Ok(())
        }
        // Handled in main before any config translation.
        Command::Config(_) => Ok(()),
    }
}

// ── One-shot session ─────────────────────────────────────────────────

/// A registered connection that has received its first snapshot.
pub struct Session {
    pub client: RelayClient,
}

impl Session {
    /// Connect, register and wait for the relay's snapshot, each step
    /// bounded by the context's wait.
    pub async fn open(ctx: &Context) -> Result<Self, CliError> {
        let client =
            RelayClient::new(ctx.connection.clone(), Arc::new(TracingHandler));
        let mut entities = client.subscribe_entities();

        client.connect().await;
        if let Err(e) = client
            .wait_for_status(ConnectionStatus::Registered, ctx.wait)
            .await
        {
            client.disconnect().await;
            return Err(match e {
                CoreError::Timeout { .. } => CliError::ConnectionFailed {
                    url: ctx.connection.url.to_string(),
                    reason: format!("not registered within {}s", ctx.wait.as_secs()),
                },
                other => other.into(),
            });
        }

        if tokio::time::timeout(ctx.wait, entities.changed()).await.is_err() {
            client.disconnect().await;
            return Err(CliError::Timeout {
                seconds: ctx.wait.as_secs(),
            });
        }

        Ok(Self { client })
    }

    /// Disconnect, writing anything still queued first.
    pub async fn close(self) {
        self.client.disconnect().await;
    }
}

/// Open a session, send one request through `send`, and close again.
/// The request is written before the connection closes.
pub async fn one_shot<F>(ctx: &Context, send: F) -> Result<(), CliError>
where
    F: FnOnce(&RelayClient) -> Result<(), CoreError> + Send,
{
    let session = Session::open(ctx).await?;
    let result = send(&session.client);
    session.close().await;
    Ok(result?)
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
