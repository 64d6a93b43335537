// ── Relay client facade ──
//
// Lifecycle entry points (configure / start / stop), observable state and
// mutation intents for one relay connection. Owns the connection task,
// the state repository and the outbound queue.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use clawlink_api::{Connector, OutboundMessage, WsConfig, WsConnector};

use crate::config::ConnectionConfig;
use crate::connection::{ConnectionStatus, ConnectionTask, RelaySignal, RelayStats, Shared};
use crate::convert::named_location;
use crate::dispatch::{CommandDispatcher, CommandHandler, TracingHandler};
use crate::error::CoreError;
use crate::model::{EntityState, LocationReport, MuteState, Rule, TrackedEntity};
use crate::sender::{OUTBOUND_QUEUE_SIZE, OutboundSender};
use crate::store::StateRepository;
use crate::stream::{EntitySubscription, RuleSubscription};

// ── RelayClient ──────────────────────────────────────────────────────

/// The main entry point for hosts.
///
/// Cheaply cloneable via `Arc<ClientInner>`. Does nothing until
/// [`start`](Self::start) or [`connect`](Self::connect) is called; from
/// then on a background task keeps the relay connection alive, with
/// exponential backoff, until [`stop`](Self::stop).
#[derive(Clone)]
pub struct RelayClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: watch::Sender<Arc<ConnectionConfig>>,
    connector: Arc<dyn Connector>,
    dispatcher: CommandDispatcher,
    shared: Arc<Shared>,
    repository: Arc<StateRepository>,
    sender: OutboundSender,
    outbound_rx: Arc<Mutex<mpsc::Receiver<OutboundMessage>>>,
    running: Mutex<Option<Running>>,
}

/// Handle to the live connection task.
struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Running {
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "connection task ended abnormally");
        }
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
    }
}

impl RelayClient {
    /// Client that reaches the relay over WebSocket and hands commands
    /// to `handler`. Transport tuning (keepalive) is taken from `config`
    /// once, here.
    pub fn new(config: ConnectionConfig, handler: Arc<dyn CommandHandler>) -> Self {
        let connector = WsConnector::new(WsConfig {
            connect_timeout: config.connect_timeout,
            keepalive: config.keepalive,
        });
        Self::with_connector(config, Arc::new(connector), handler)
    }

    /// Client over an arbitrary transport.
    pub fn with_connector(
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        let shared = Arc::new(Shared::new(config.reconnect.base_delay));
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);
        let sender = OutboundSender::new(outbound_tx, shared.status.subscribe());
        let repository = Arc::new(StateRepository::new(sender.clone()));
        let (config, _) = watch::channel(Arc::new(config));

        Self {
            inner: Arc::new(ClientInner {
                config,
                connector,
                dispatcher: CommandDispatcher::new(handler),
                shared,
                repository,
                sender,
                outbound_rx: Arc::new(Mutex::new(outbound_rx)),
                running: Mutex::new(None),
            }),
        }
    }

    /// Client over `connector` that only logs commands.
    pub fn with_tracing_handler(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        Self::with_connector(config, connector, Arc::new(TracingHandler))
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Replace the configuration. Takes effect on the next connection
    /// lifecycle; a running one is left alone.
    pub fn configure(&self, config: ConnectionConfig) {
        debug!(url = %config.url, "relay configuration updated");
        self.inner.config.send_replace(Arc::new(config));
    }

    pub fn config(&self) -> Arc<ConnectionConfig> {
        self.inner.config.borrow().clone()
    }

    /// Make sure a connection lifecycle is running. Does nothing if one
    /// already is; safe to call repeatedly from a lifecycle keeper.
    pub async fn start(&self) {
        {
            let running = self.inner.running.lock().await;
            if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
                return;
            }
        }
        self.connect().await;
    }

    /// Stop the connection lifecycle. Alias of [`disconnect`](Self::disconnect).
    pub async fn stop(&self) {
        self.disconnect().await;
    }

    /// Start a fresh connection lifecycle with the base backoff delay,
    /// tearing down any existing one first.
    pub async fn connect(&self) {
        let mut running = self.inner.running.lock().await;
        let epoch = self.inner.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(old) = running.take() {
            old.stop().await;
        }
        // The old link is gone; nothing may be accepted for it.
        self.inner.shared.set_status(ConnectionStatus::Connecting);
        self.inner.shared.failures.store(0, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let task = ConnectionTask {
            epoch,
            config: self.config(),
            connector: Arc::clone(&self.inner.connector),
            shared: Arc::clone(&self.inner.shared),
            repository: Arc::clone(&self.inner.repository),
            dispatcher: self.inner.dispatcher.clone(),
            outbound: Arc::clone(&self.inner.outbound_rx),
            cancel: cancel.clone(),
        };

        info!(epoch, url = %task.config.url, "starting relay connection");
        *running = Some(Running {
            cancel,
            handle: tokio::spawn(task.run()),
        });
    }

    /// Close the connection and cancel every pending timer. Idempotent;
    /// safe before any `connect()`. Messages already accepted by the
    /// sender are written before the link closes.
    pub async fn disconnect(&self) {
        let mut running = self.inner.running.lock().await;
        self.inner.shared.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(old) = running.take() {
            old.stop().await;
            info!("relay connection stopped");
        }
        self.inner.shared.set_status(ConnectionStatus::Disconnected);
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn status(&self) -> ConnectionStatus {
        *self.inner.shared.status.borrow()
    }

    /// Subscribe to status changes. The receiver starts at the current value.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.shared.status.subscribe()
    }

    /// Wait until the status is `target`, for at most `timeout`.
    pub async fn wait_for_status(
        &self,
        target: ConnectionStatus,
        timeout: Duration,
    ) -> Result<(), CoreError> {
        let mut rx = self.subscribe_status();
        tokio::time::timeout(timeout, rx.wait_for(|s| *s == target))
            .await
            .map_err(|_| CoreError::Timeout {
                timeout_secs: timeout.as_secs(),
            })?
            .map(|_| ())
            .map_err(|_| CoreError::Internal("status channel closed".into()))
    }

    pub fn signals(&self) -> broadcast::Receiver<RelaySignal> {
        self.inner.shared.signals.subscribe()
    }

    pub fn stats(&self) -> RelayStats {
        self.inner.shared.stats()
    }

    pub fn repository(&self) -> &Arc<StateRepository> {
        &self.inner.repository
    }

    pub fn sender(&self) -> &OutboundSender {
        &self.inner.sender
    }

    // ── Snapshot accessors (delegate to the repository) ─────────────

    pub fn entities(&self) -> Arc<Vec<Arc<TrackedEntity>>> {
        self.inner.repository.entities()
    }

    pub fn subscribe_entities(&self) -> EntitySubscription {
        self.inner.repository.subscribe_entities()
    }

    pub fn rules(&self) -> Arc<Vec<Arc<Rule>>> {
        self.inner.repository.rules()
    }

    pub fn subscribe_rules(&self) -> RuleSubscription {
        self.inner.repository.subscribe_rules()
    }

    pub fn mute(&self) -> MuteState {
        self.inner.repository.mute()
    }

    // ── Intents ──────────────────────────────────────────────────────

    pub fn set_entity_state(&self, name: &str, state: EntityState) -> Result<(), CoreError> {
        self.inner.repository.request_entity_state_change(name, state)
    }

    pub fn request_mute(&self, until: Option<DateTime<Utc>>) -> Result<(), CoreError> {
        self.inner.repository.request_mute(until)
    }

    pub fn add_rule(&self, rule: &Rule) -> Result<(), CoreError> {
        self.inner.repository.add_rule(rule)
    }

    pub fn update_rule(&self, rule: &Rule) -> Result<(), CoreError> {
        self.inner.repository.update_rule(rule)
    }

    pub fn remove_rule(&self, id: &str) -> Result<(), CoreError> {
        self.inner.repository.remove_rule(id)
    }

    /// Ask the relay to push a test `command` back to this client.
    pub fn request_test_ping(&self) -> Result<(), CoreError> {
        self.inner.sender.send(OutboundMessage::RequestTestPing)
    }

    pub fn report_location(&self, report: &LocationReport) -> Result<(), CoreError> {
        self.inner
            .sender
            .send(OutboundMessage::LocationUpdate(report.into()))
    }

    /// Register the place `report` was taken at under `name`.
    pub fn save_named_location(&self, name: &str, report: &LocationReport) -> Result<(), CoreError> {
        if name.trim().is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "location name must not be empty".into(),
            });
        }
        self.inner.sender.send(OutboundMessage::SaveNamedLocation {
            location: named_location(name.trim(), report),
        })
    }

    pub fn set_location_tracking(&self, enabled: bool) -> Result<(), CoreError> {
        self.inner
            .sender
            .send(OutboundMessage::SetLocationTracking { enabled })
    }
}
