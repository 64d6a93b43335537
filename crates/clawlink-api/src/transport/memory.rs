//! In-memory transport.
//!
//! [`MemoryConnector`] hands out channel-backed [`Link`]s and gives the
//! other ends ([`LinkPeer`]s) to a [`MemoryListener`], so the connection
//! state machine can be driven frame by frame without a socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Connector, LINK_CHANNEL_CAPACITY, Link, LinkEvent};
use crate::error::Error;

/// Create a connected link / peer pair.
pub fn pair() -> (Link, LinkPeer) {
    let (out_tx, out_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
    let (in_tx, in_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
    let shutdown = CancellationToken::new();

    let link = Link::from_parts(out_tx, in_rx, shutdown.clone());
    let peer = LinkPeer {
        sent: out_rx,
        events: in_tx,
        shutdown,
    };
    (link, peer)
}

// ── LinkPeer ─────────────────────────────────────────────────────────

/// The relay side of an in-memory link.
#[derive(Debug)]
pub struct LinkPeer {
    sent: mpsc::Receiver<String>,
    events: mpsc::Sender<LinkEvent>,
    shutdown: CancellationToken,
}

impl LinkPeer {
    /// Deliver a text frame to the client.
    pub async fn push(&self, text: impl Into<String>) {
        let _ = self.events.send(LinkEvent::Frame(text.into())).await;
    }

    /// Deliver a JSON value as a text frame.
    pub async fn push_json(&self, value: &serde_json::Value) {
        self.push(value.to_string()).await;
    }

    /// Next frame the client wrote, or `None` once the client side is gone.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    /// Next frame the client wrote, parsed as JSON.
    pub async fn next_sent_json(&mut self) -> Option<serde_json::Value> {
        let text = self.next_sent().await?;
        serde_json::from_str(&text).ok()
    }

    /// Frame already written by the client, without waiting.
    pub fn try_next_sent(&mut self) -> Option<String> {
        self.sent.try_recv().ok()
    }

    /// Simulate the relay closing the connection.
    pub async fn close(&self, code: u16, reason: &str) {
        let _ = self
            .events
            .send(LinkEvent::Closed {
                code: Some(code),
                reason: reason.to_owned(),
            })
            .await;
    }

    /// Simulate a transport failure (connection reset, ...).
    pub async fn fail(&self, reason: &str) {
        let _ = self
            .events
            .send(LinkEvent::Failed(Error::WebSocketConnect(reason.to_owned())))
            .await;
    }

    /// `true` once the client has closed or dropped its end.
    pub fn is_closed_by_client(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolves when the client closes or drops its end.
    pub async fn closed_by_client(&self) {
        self.shutdown.cancelled().await;
    }
}

// ── MemoryConnector ──────────────────────────────────────────────────

/// [`Connector`] that never touches the network.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accepted: mpsc::UnboundedSender<LinkPeer>,
    refuse_next: Arc<AtomicU32>,
    attempts: Arc<AtomicU32>,
}

/// Receives the relay side of every connection a [`MemoryConnector`] opens.
#[derive(Debug)]
pub struct MemoryListener {
    accepted: mpsc::UnboundedReceiver<LinkPeer>,
}

impl MemoryConnector {
    pub fn new() -> (Self, MemoryListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            accepted: tx,
            refuse_next: Arc::new(AtomicU32::new(0)),
            attempts: Arc::new(AtomicU32::new(0)),
        };
        (connector, MemoryListener { accepted: rx })
    }

    /// Make the next `count` connection attempts fail.
    pub fn refuse_next(&self, count: u32) {
        self.refuse_next.store(count, Ordering::SeqCst);
    }

    /// Number of connection attempts so far, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn open(&self) -> Result<Link, Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .refuse_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(Error::WebSocketConnect("connection refused".into()));
        }

        let (link, peer) = pair();
        let _ = self.accepted.send(peer);
        Ok(link)
    }
}

impl Connector for MemoryConnector {
    fn connect<'a>(&'a self, _url: &'a Url) -> BoxFuture<'a, Result<Link, Error>> {
        let result = self.open();
        Box::pin(async move { result })
    }
}

impl MemoryListener {
    /// Wait for the next connection the client opens.
    pub async fn accept(&mut self) -> Option<LinkPeer> {
        self.accepted.recv().await
    }

    /// A connection that has already been opened, without waiting.
    pub fn try_accept(&mut self) -> Option<LinkPeer> {
        self.accepted.try_recv().ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (mut link, mut peer) = pair();

        link.send("hello".into()).await.unwrap();
        assert_eq!(peer.next_sent().await.as_deref(), Some("hello"));

        peer.push("world").await;
        match link.recv().await {
            Some(LinkEvent::Frame(text)) => assert_eq!(text, "world"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn closing_the_link_is_visible_to_the_peer() {
        let (link, peer) = pair();
        assert!(!peer.is_closed_by_client());
        link.close();
        assert!(peer.is_closed_by_client());
        assert!(matches!(link.send("late".into()).await, Err(Error::LinkClosed)));
    }

    #[tokio::test]
    async fn refused_attempts_are_counted() {
        let (connector, mut listener) = MemoryConnector::new();
        let url = Url::parse("ws://relay.test").unwrap();
        connector.refuse_next(1);

        assert!(connector.connect(&url).await.is_err());
        assert!(listener.try_accept().is_none());

        let _link = connector.connect(&url).await.unwrap();
        assert!(listener.try_accept().is_some());
        assert_eq!(connector.attempts(), 2);
    }
}
