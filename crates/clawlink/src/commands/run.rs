//! `run` -- the long-lived host.
//!
//! Starts the relay client, prints status changes, entity transitions
//! and relay signals, and keeps the connection lifecycle alive until
//! Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::Notify;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use clawlink_core::{EntityState, RelayClient, RelaySignal, Transition};

use super::Context;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::sink::TerminalSink;

/// How often the keeper makes sure a connection lifecycle is running.
const KEEPER_INTERVAL: Duration = Duration::from_secs(60);

pub async fn handle(args: RunArgs, ctx: &Context) -> Result<(), CliError> {
    let wake = Arc::new(Notify::new());
    let sink = Arc::new(TerminalSink::stdout(!args.no_bell, Arc::clone(&wake)));
    let client = RelayClient::new(ctx.connection.clone(), sink);

    let mut status = client.subscribe_status();
    let mut signals = client.signals();
    let mut entities = client.subscribe_entities();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut keeper = tokio::time::interval(KEEPER_INTERVAL);
    keeper.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(url = %ctx.connection.url, "clawlink starting");
    eprintln!("connecting to {} (Ctrl-C to stop)", ctx.connection.url);
    client.start().await;

    loop {
        tokio::select! {
            biased;

            result = &mut ctrl_c => {
                if let Err(e) = result {
                    debug!(error = %e, "ctrl-c handler unavailable");
                }
                break;
            }

            () = wake.notified() => {
                debug!("wake requested");
                client.start().await;
            }

            _ = keeper.tick() => client.start().await,

            Ok(()) = status.changed() => {
                let current = *status.borrow_and_update();
                eprintln!("{} status: {current}", timestamp());
            }

            signal = signals.recv() => match signal {
                Ok(signal) => report_signal(&signal, ctx, args.log_tail),
                Err(RecvError::Lagged(n)) => debug!(skipped = n, "signal receiver lagged"),
                Err(RecvError::Closed) => break,
            },

            Some(moves) = entities.next_transitions() => {
                for transition in &moves {
                    println!("{} {}", timestamp(), describe(transition));
                }
            }
        }
    }

    client.stop().await;
    info!(status = %client.status(), "clawlink stopped");
    eprintln!("disconnected");
    Ok(())
}

fn report_signal(signal: &RelaySignal, ctx: &Context, log_tail: usize) {
    match signal {
        RelaySignal::Registered { client_id } => {
            let id = client_id.as_deref().unwrap_or("-");
            eprintln!("{} registered with relay (client id {id})", timestamp());
        }
        RelaySignal::PersistentlyUnreachable {
            consecutive_failures,
        } => {
            eprintln!(
                "{} relay unreachable after {consecutive_failures} attempts; still retrying",
                timestamp()
            );
            let recent = ctx.logs.recent(log_tail);
            if !recent.is_empty() {
                eprintln!("recent log:");
                for entry in recent {
                    eprintln!("  {entry}");
                }
            }
        }
    }
}

fn describe(transition: &Transition) -> String {
    let name = &transition.name;
    match (transition.from, transition.to) {
        (None, state) => format!("{name} is {state}"),
        (Some(_), EntityState::Outside) => format!("{name} went outside"),
        (Some(_), EntityState::Inside) => format!("{name} came inside"),
        (Some(_), EntityState::Unknown) => format!("{name} is unknown"),
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(from: Option<EntityState>, to: EntityState) -> Transition {
        Transition {
            name: "Tom".into(),
            from,
            to,
        }
    }

    #[test]
    fn first_sighting_states_the_current_state() {
        assert_eq!(describe(&transition(None, EntityState::Outside)), "Tom is outside");
        assert_eq!(describe(&transition(None, EntityState::Inside)), "Tom is inside");
    }

    #[test]
    fn moves_are_described_by_direction() {
        assert_eq!(
            describe(&transition(Some(EntityState::Inside), EntityState::Outside)),
            "Tom went outside"
        );
        assert_eq!(
            describe(&transition(Some(EntityState::Outside), EntityState::Inside)),
            "Tom came inside"
        );
        assert_eq!(
            describe(&transition(Some(EntityState::Inside), EntityState::Unknown)),
            "Tom is unknown"
        );
    }
}
