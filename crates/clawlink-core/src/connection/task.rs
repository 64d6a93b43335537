// ── Connection task ──
//
// Connecting → Registered → (link drops) → Disconnected → Reconnecting
// → Connecting ... until cancelled. Inbound frames are decoded and
// applied here, one at a time, so repository mutations never interleave.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use clawlink_api::{Connector, InboundMessage, Link, LinkEvent, OutboundMessage, decode, encode};

use super::{ConnectionStatus, RelaySignal, Shared};
use crate::backoff::Backoff;
use crate::config::ConnectionConfig;
use crate::dispatch::CommandDispatcher;
use crate::error::CoreError;
use crate::store::StateRepository;

type OutboundQueue = OwnedMutexGuard<mpsc::Receiver<OutboundMessage>>;

/// Upper bound on writing queued messages during a requested close.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of one connection attempt.
enum Attempt {
    Open(Link),
    Failed(CoreError),
    Cancelled,
}

/// Why a registered session ended.
enum SessionEnd {
    Dropped(String),
    Cancelled,
}

/// Everything one connection lifecycle needs. Consumed by [`run`](Self::run).
pub(crate) struct ConnectionTask {
    pub(crate) epoch: u64,
    pub(crate) config: Arc<ConnectionConfig>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) shared: Arc<Shared>,
    pub(crate) repository: Arc<StateRepository>,
    pub(crate) dispatcher: CommandDispatcher,
    pub(crate) outbound: Arc<Mutex<mpsc::Receiver<OutboundMessage>>>,
    pub(crate) cancel: CancellationToken,
}

impl ConnectionTask {
    pub(crate) async fn run(self) {
        let mut queue = Arc::clone(&self.outbound).lock_owned().await;
        let policy = self.config.reconnect;
        let mut backoff = Backoff::new(policy.base_delay, policy.max_delay);
        self.shared.record_backoff(backoff.peek());

        debug!(epoch = self.epoch, url = %self.config.url, "connection task started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.publish(ConnectionStatus::Connecting);
            let reason = match self.open().await {
                Attempt::Cancelled => break,
                Attempt::Failed(e) => e.to_string(),
                Attempt::Open(link) => match self.session(link, &mut queue, &mut backoff).await {
                    SessionEnd::Cancelled => break,
                    SessionEnd::Dropped(reason) => reason,
                },
            };

            discard_queued(&mut queue);
            self.publish(ConnectionStatus::Disconnected);
            let failures = self.record_failure();

            let delay = backoff.next();
            self.shared.record_backoff(backoff.peek());
            self.publish(ConnectionStatus::Reconnecting);
            warn!(
                epoch = self.epoch,
                attempt = failures,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                reason = %reason,
                "relay connection lost; reconnecting"
            );

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        discard_queued(&mut queue);
        debug!(epoch = self.epoch, "connection task stopped");
    }

    // ── Phases ───────────────────────────────────────────────────────

    async fn open(&self) -> Attempt {
        let timeout = self.config.connect_timeout;
        let connect = tokio::time::timeout(timeout, self.connector.connect(&self.config.url));

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Attempt::Cancelled,
            result = connect => match result {
                Ok(Ok(link)) => Attempt::Open(link),
                Ok(Err(e)) => Attempt::Failed(e.into()),
                Err(_) => Attempt::Failed(CoreError::Timeout {
                    timeout_secs: timeout.as_secs(),
                }),
            },
        }
    }

    async fn session(
        &self,
        mut link: Link,
        queue: &mut OutboundQueue,
        backoff: &mut Backoff,
    ) -> SessionEnd {
        if let Err(e) = self.write(&link, &self.register_message()).await {
            if self.cancel.is_cancelled() {
                return SessionEnd::Cancelled;
            }
            return SessionEnd::Dropped(format!("register failed: {e}"));
        }

        self.shared.failures.store(0, Ordering::Relaxed);
        backoff.reset();
        self.shared.record_backoff(backoff.peek());
        self.publish(ConnectionStatus::Registered);
        info!(epoch = self.epoch, url = %self.config.url, "registered with relay");

        let idle = self.config.idle_timeout;
        let mut deadline = idle.map(|d| Instant::now() + d);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return close_requested(&link, queue).await,
                event = link.recv() => {
                    let text = match event {
                        Some(LinkEvent::Frame(text)) => text,
                        Some(LinkEvent::Closed { code, reason }) => {
                            return SessionEnd::Dropped(format!("closed by relay ({code:?}): {reason}"));
                        }
                        Some(LinkEvent::Failed(e)) => return SessionEnd::Dropped(e.to_string()),
                        None => return SessionEnd::Dropped("transport gone".into()),
                    };
                    if let Some(d) = idle {
                        deadline = Some(Instant::now() + d);
                    }
                    if let Err(e) = self.handle_frame(&link, &text).await {
                        if self.cancel.is_cancelled() {
                            return close_requested(&link, queue).await;
                        }
                        return SessionEnd::Dropped(e.to_string());
                    }
                }
                Some(message) = queue.recv() => {
                    if let Err(e) = self.write(&link, &message).await {
                        if self.cancel.is_cancelled() {
                            return close_requested(&link, queue).await;
                        }
                        return SessionEnd::Dropped(format!("write failed: {e}"));
                    }
                }
                () = idle_elapsed(deadline) => {
                    link.close();
                    return SessionEnd::Dropped("idle timeout".into());
                }
            }
        }
    }

    // ── Inbound ──────────────────────────────────────────────────────

    async fn handle_frame(&self, link: &Link, text: &str) -> Result<(), clawlink_api::Error> {
        let message = match decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return Ok(());
            }
        };

        match message {
            InboundMessage::Ping => self.write(link, &OutboundMessage::Pong).await?,
            InboundMessage::Welcome { client_id } => {
                info!(client_id = ?client_id, "relay welcome");
                self.shared.client_id.send_replace(client_id.clone());
                let _ = self.shared.signals.send(RelaySignal::Registered { client_id });
            }
            InboundMessage::Command(frame) => {
                if let Some(ack) = self.dispatcher.dispatch(frame) {
                    self.write(link, &ack).await?;
                }
            }
            InboundMessage::Snapshot(frame) => self.repository.apply_snapshot_frame(frame),
            InboundMessage::EntityChanged(frame) => {
                self.repository.apply_entity_changed(&frame);
            }
            InboundMessage::MuteState(mute) | InboundMessage::MuteAck(mute) => {
                self.repository.apply_mute_frame(mute);
            }
            InboundMessage::RulesChanged(rules) => self.repository.apply_rules_frame(rules),
            InboundMessage::Unknown { kind } => debug!(kind = %kind, "ignoring unknown message type"),
        }
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Queue one message on the link. Gives up as soon as the lifecycle
    /// is cancelled, so a stalled transport can't hold up `disconnect()`.
    async fn write(
        &self,
        link: &Link,
        message: &OutboundMessage,
    ) -> Result<(), clawlink_api::Error> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(clawlink_api::Error::LinkClosed),
            result = link.send(encode(message)) => result,
        }
    }

    fn register_message(&self) -> OutboundMessage {
        OutboundMessage::Register {
            info: self.config.client.to_register_info(),
            fcm_token: self.config.push_token().map(str::to_owned),
        }
    }

    /// Publish a status change, unless this task has been superseded.
    fn publish(&self, status: ConnectionStatus) {
        if self.is_current() {
            self.shared.set_status(status);
        }
    }

    fn is_current(&self) -> bool {
        !self.cancel.is_cancelled() && self.shared.epoch.load(Ordering::SeqCst) == self.epoch
    }

    /// Count a failed or dropped connection and raise the unreachable
    /// signal when the streak reaches the threshold.
    fn record_failure(&self) -> u32 {
        let failures = self.shared.failures.fetch_add(1, Ordering::Relaxed) + 1;
        let threshold = self.config.reconnect.unreachable_after;

        if failures == threshold && self.is_current() {
            warn!(consecutive_failures = failures, "relay persistently unreachable");
            let _ = self.shared.signals.send(RelaySignal::PersistentlyUnreachable {
                consecutive_failures: failures,
            });
        }
        failures
    }
}

async fn idle_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// Write whatever is still queued, then close the link.
async fn close_requested(link: &Link, queue: &mut OutboundQueue) -> SessionEnd {
    if tokio::time::timeout(FLUSH_TIMEOUT, flush_queued(link, queue))
        .await
        .is_err()
    {
        warn!("transport stalled while flushing; dropping the rest of the queue");
    }
    link.close();
    SessionEnd::Cancelled
}

async fn flush_queued(link: &Link, queue: &mut OutboundQueue) {
    while let Ok(message) = queue.try_recv() {
        if link.send(encode(&message)).await.is_err() {
            break;
        }
    }
}

/// Drop messages that were queued for a connection that is now gone.
fn discard_queued(queue: &mut OutboundQueue) {
    while let Ok(message) = queue.try_recv() {
        debug!(kind = message.kind(), "discarding message queued for a closed connection");
    }
}
