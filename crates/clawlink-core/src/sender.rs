// ── Outbound sender ──
//
// Hands outbound messages to the connection task, which is the only
// writer on the socket. Never blocks: a message is either queued for a
// registered connection right away or rejected.

use tokio::sync::{mpsc, watch};
use tracing::debug;

use clawlink_api::OutboundMessage;

use crate::connection::ConnectionStatus;
use crate::error::CoreError;

/// Messages waiting for the connection task.
pub(crate) const OUTBOUND_QUEUE_SIZE: usize = 64;

/// Cloneable handle for queueing messages to the relay.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    queue: mpsc::Sender<OutboundMessage>,
    status: watch::Receiver<ConnectionStatus>,
}

impl OutboundSender {
    pub(crate) fn new(
        queue: mpsc::Sender<OutboundMessage>,
        status: watch::Receiver<ConnectionStatus>,
    ) -> Self {
        Self { queue, status }
    }

    /// Queue `message` for the live connection.
    ///
    /// Fails with [`CoreError::NotConnected`] unless the connection is
    /// registered, and with [`CoreError::QueueFull`] under backpressure.
    /// Nothing is retried; the caller decides whether the failure matters.
    pub fn send(&self, message: OutboundMessage) -> Result<(), CoreError> {
        let kind = message.kind();
        if !self.status.borrow().is_registered() {
            debug!(kind, "not registered; dropping outbound message");
            return Err(CoreError::NotConnected);
        }

        self.queue.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                debug!(kind, "outbound queue full");
                CoreError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => CoreError::NotConnected,
        })
    }

    /// Current connection status, as seen by the sender.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sender(capacity: usize) -> (
        OutboundSender,
        mpsc::Receiver<OutboundMessage>,
        watch::Sender<ConnectionStatus>,
    ) {
        let (tx, rx) = mpsc::channel(capacity);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        (OutboundSender::new(tx, status_rx), rx, status_tx)
    }

    #[test]
    fn rejects_unless_registered() {
        let (sender, mut rx, status) = sender(4);

        for state in [
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connecting,
            ConnectionStatus::Reconnecting,
        ] {
            status.send_replace(state);
            assert!(matches!(
                sender.send(OutboundMessage::RequestTestPing),
                Err(CoreError::NotConnected)
            ));
        }
        assert!(rx.try_recv().is_err());

        status.send_replace(ConnectionStatus::Registered);
        tokio_test::assert_ok!(sender.send(OutboundMessage::RequestTestPing));
        assert_eq!(rx.try_recv().unwrap(), OutboundMessage::RequestTestPing);
    }

    #[test]
    fn full_queue_is_reported_without_blocking() {
        let (sender, _rx, status) = sender(1);
        status.send_replace(ConnectionStatus::Registered);

        tokio_test::assert_ok!(sender.send(OutboundMessage::RequestTestPing));
        assert!(matches!(
            sender.send(OutboundMessage::RequestTestPing),
            Err(CoreError::QueueFull)
        ));
    }
}
