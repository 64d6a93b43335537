// ── Connection state machine ──
//
// One background task per connection lifecycle owns the physical link,
// the reconnect timers and every socket write. The `RelayClient` starts
// and stops it; everything else talks to it through channels.

mod status;
mod task;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, watch};

pub use status::{ConnectionStatus, RelaySignal, RelayStats};
pub(crate) use task::ConnectionTask;

const SIGNAL_CHANNEL_SIZE: usize = 16;

/// State shared between the client facade and its connection task.
pub(crate) struct Shared {
    pub(crate) status: watch::Sender<ConnectionStatus>,
    pub(crate) signals: broadcast::Sender<RelaySignal>,
    pub(crate) client_id: watch::Sender<Option<String>>,
    /// Current lifecycle stamp. A task whose epoch no longer matches
    /// must not publish anything.
    pub(crate) epoch: AtomicU64,
    pub(crate) failures: AtomicU32,
    next_backoff_ms: AtomicU64,
}

impl Shared {
    pub(crate) fn new(base_delay: Duration) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        let (signals, _) = broadcast::channel(SIGNAL_CHANNEL_SIZE);
        let (client_id, _) = watch::channel(None);

        Self {
            status,
            signals,
            client_id,
            epoch: AtomicU64::new(0),
            failures: AtomicU32::new(0),
            next_backoff_ms: AtomicU64::new(duration_ms(base_delay)),
        }
    }

    /// Publish `status` if it differs from the current one.
    pub(crate) fn set_status(&self, status: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    pub(crate) fn record_backoff(&self, delay: Duration) {
        self.next_backoff_ms
            .store(duration_ms(delay), Ordering::Relaxed);
    }

    pub(crate) fn stats(&self) -> RelayStats {
        RelayStats {
            status: *self.status.borrow(),
            consecutive_failures: self.failures.load(Ordering::Relaxed),
            next_backoff: Duration::from_millis(self.next_backoff_ms.load(Ordering::Relaxed)),
            epoch: self.epoch.load(Ordering::SeqCst),
            client_id: self.client_id.borrow().clone(),
        }
    }
}

fn duration_ms(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}
