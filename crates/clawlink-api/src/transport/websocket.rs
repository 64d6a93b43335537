// WebSocket connector
//
// Opens a relay connection with tokio-tungstenite and spawns a pump task
// that owns the socket: it forwards inbound text frames to the link,
// writes queued outbound frames, and sends keepalive pings. Exactly one
// task touches the socket, so writes never interleave.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{
    self,
    protocol::{CloseFrame, frame::coding::CloseCode},
};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Connector, LINK_CHANNEL_CAPACITY, Link, LinkEvent};
use crate::error::Error;

// ── WsConfig ─────────────────────────────────────────────────────────

/// Tuning for [`WsConnector`].
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Upper bound on the TCP + TLS + upgrade handshake. Default: 10s.
    pub connect_timeout: Duration,
    /// Interval between WebSocket-level pings. `None` disables them.
    /// Default: 30s.
    pub keepalive: Option<Duration>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            keepalive: Some(Duration::from_secs(30)),
        }
    }
}

// ── WsConnector ──────────────────────────────────────────────────────

/// [`Connector`] backed by a real WebSocket.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    config: WsConfig,
}

impl WsConnector {
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    async fn open(&self, url: &Url) -> Result<Link, Error> {
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::UnsupportedScheme {
                    scheme: other.to_owned(),
                });
            }
        }

        tracing::info!(url = %url, "Connecting to relay");

        let handshake = tokio_tungstenite::connect_async(url.as_str());
        let (ws_stream, _response) = tokio::time::timeout(self.config.connect_timeout, handshake)
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: self.config.connect_timeout.as_secs(),
            })?
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        tracing::info!("WebSocket connected");

        Ok(spawn_pump(ws_stream, self.config.keepalive))
    }
}

impl Connector for WsConnector {
    fn connect<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Link, Error>> {
        Box::pin(self.open(url))
    }
}

/// Wrap an established WebSocket in a [`Link`] served by a pump task.
pub(crate) fn spawn_pump<S>(ws: WebSocketStream<S>, keepalive: Option<Duration>) -> Link
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
    let (in_tx, in_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
    let shutdown = CancellationToken::new();

    tokio::spawn(pump(ws, out_rx, in_tx, shutdown.clone(), keepalive));

    Link::from_parts(out_tx, in_rx, shutdown)
}

// ── Pump task ────────────────────────────────────────────────────────

async fn pump<S>(
    ws: WebSocketStream<S>,
    mut outbound: mpsc::Receiver<String>,
    inbound: mpsc::Sender<LinkEvent>,
    shutdown: CancellationToken,
    keepalive: Option<Duration>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut write, mut read) = ws.split();
    let mut ticker = keepalive.map(|period| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    // A reserved inbound slot. The socket is only read while one is held,
    // so a slow consumer stalls reads but never the outbound drain.
    let mut slot: Option<mpsc::OwnedPermit<LinkEvent>> = None;

    let event = loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                // Frames queued before the close still go out.
                while let Ok(text) = outbound.try_recv() {
                    if write.send(tungstenite::Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                let _ = write.send(close_frame()).await;
                tracing::debug!("link closed locally");
                return;
            }
            text = outbound.recv() => {
                let Some(text) = text else {
                    let _ = write.send(close_frame()).await;
                    return;
                };
                if let Err(e) = write.send(tungstenite::Message::Text(text.into())).await {
                    break LinkEvent::Failed(Error::WebSocketConnect(e.to_string()));
                }
            }
            () = next_tick(ticker.as_mut()) => {
                if let Err(e) = write.send(tungstenite::Message::Ping(Vec::new().into())).await {
                    break LinkEvent::Failed(Error::WebSocketConnect(e.to_string()));
                }
            }
            reserved = inbound.clone().reserve_owned(), if slot.is_none() => {
                let Ok(permit) = reserved else {
                    // Link dropped without closing; nobody is listening.
                    let _ = write.send(close_frame()).await;
                    return;
                };
                slot = Some(permit);
            }
            frame = read.next(), if slot.is_some() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(permit) = slot.take() {
                            permit.send(LinkEvent::Frame(text.as_str().to_owned()));
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let (code, reason) = frame.map_or((None, String::new()), |cf| {
                            (Some(u16::from(cf.code)), cf.reason.as_str().to_owned())
                        });
                        tracing::info!(?code, reason = %reason, "WebSocket close frame received");
                        break LinkEvent::Closed { code, reason };
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite queues the pong; it goes out with the next write/flush
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(_)) => {
                        // Binary, Pong, Frame -- ignore
                    }
                    Some(Err(e)) => break LinkEvent::Failed(Error::WebSocketConnect(e.to_string())),
                    None => {
                        tracing::info!("WebSocket stream ended");
                        break LinkEvent::Closed { code: None, reason: "stream ended".into() };
                    }
                }
            }
        }
    };

    match slot {
        Some(permit) => {
            permit.send(event);
        }
        None => {
            let _ = inbound.send(event).await;
        }
    }
}

async fn next_tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn close_frame() -> tungstenite::Message {
    tungstenite::Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "app disconnect".into(),
    }))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_ws_config() {
        let config = WsConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.keepalive, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn rejects_non_websocket_scheme() {
        let connector = WsConnector::default();
        let url = Url::parse("https://relay.example/ws").unwrap();
        let err = connector.connect(&url).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme { ref scheme } if scheme == "https"));
        assert!(!err.is_transient());
    }
}
