//! Transport seam between the connection state machine and the socket.
//!
//! A [`Connector`] opens one physical connection and hands back a [`Link`]:
//! a pair of channels fed by a background pump task. The state machine
//! only ever talks to the `Link`, which keeps it independent of the
//! concrete transport. [`WsConnector`] is the real WebSocket
//! implementation; [`memory::MemoryConnector`] backs tests.

pub mod memory;
mod websocket;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

pub use websocket::{WsConfig, WsConnector};

/// Frames buffered in each direction before senders have to wait.
pub const LINK_CHANNEL_CAPACITY: usize = 64;

/// Opens physical connections to the relay.
pub trait Connector: Send + Sync + 'static {
    /// Establish a new connection. Resolves once the transport is open.
    fn connect<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Link, Error>>;
}

/// Something that happened on an open link.
#[derive(Debug)]
pub enum LinkEvent {
    /// A text frame from the relay.
    Frame(String),
    /// The relay closed the connection (or the stream ended).
    Closed { code: Option<u16>, reason: String },
    /// The transport failed (reset, protocol error, ...).
    Failed(Error),
}

/// One open physical connection.
///
/// Dropping the link (or calling [`close`](Self::close)) tells the pump
/// task to send a close frame and exit.
#[derive(Debug)]
pub struct Link {
    outbound: mpsc::Sender<String>,
    inbound: mpsc::Receiver<LinkEvent>,
    shutdown: CancellationToken,
}

impl Link {
    /// Assemble a link from the channel ends a pump task serves.
    pub fn from_parts(
        outbound: mpsc::Sender<String>,
        inbound: mpsc::Receiver<LinkEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            outbound,
            inbound,
            shutdown,
        }
    }

    /// Queue a text frame for writing, waiting for a slot if the
    /// outbound buffer is full.
    pub async fn send(&self, text: String) -> Result<(), Error> {
        if self.shutdown.is_cancelled() {
            return Err(Error::LinkClosed);
        }
        self.outbound.send(text).await.map_err(|_| Error::LinkClosed)
    }

    /// Wait for the next event. `None` means the pump is gone.
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.inbound.recv().await
    }

    /// Ask the pump to close the connection.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
