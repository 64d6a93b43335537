//! Bounded in-memory log history.
//!
//! [`LogBuffer`] is a `tracing_subscriber::Layer` that keeps the most
//! recent events so the host can show them on demand (for example when
//! the relay has been unreachable for a while). It is constructed
//! explicitly and handed to the subscriber; clones share one buffer.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

pub const DEFAULT_CAPACITY: usize = 300;

/// One captured event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub level: Level,
    pub target: String,
    /// The event message followed by its fields as `key=value`.
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:>5} {}: {}",
            self.at.format("%H:%M:%S%.3f"),
            self.level,
            self.target,
            self.message
        )
    }
}

#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        let entries = self.lock();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    fn push(&self, entry: LogEntry) {
        let mut entries = self.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: Subscriber> Layer<S> for LogBuffer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        self.push(LogEntry {
            at: Utc::now(),
            level: *metadata.level(),
            target: metadata.target().to_owned(),
            message: visitor.finish(),
        });
    }
}

// ── Field visitor ────────────────────────────────────────────────────

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.record_debug(field, &value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
            return;
        }
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={value:?}", field.name());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    fn capture(buffer: &LogBuffer, f: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry().with(buffer.clone());
        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn keeps_message_and_fields() {
        let buffer = LogBuffer::new(10);
        capture(&buffer, || {
            tracing::warn!(attempt = 3, reason = "refused", "relay connection lost");
        });

        let entries = buffer.recent(usize::MAX);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, Level::WARN);
        assert_eq!(
            entries[0].message,
            "relay connection lost attempt=3 reason=\"refused\""
        );
        assert!(entries[0].to_string().contains("WARN"));
    }

    #[test]
    fn drops_oldest_when_full() {
        let buffer = LogBuffer::new(3);
        capture(&buffer, || {
            for i in 0..5 {
                tracing::info!("event {i}");
            }
        });

        let messages: Vec<_> = buffer
            .recent(usize::MAX)
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages, ["event 2", "event 3", "event 4"]);
        assert_eq!(buffer.recent(2).len(), 2);
        assert_eq!(buffer.recent(2)[0].message, "event 3");
        assert_eq!(buffer.recent(10).len(), 3);
    }

    #[test]
    fn clones_share_storage() {
        let buffer = LogBuffer::default();
        let observer = buffer.clone();
        capture(&buffer, || tracing::error!("boom"));
        assert_eq!(observer.recent(5).len(), 1);
        assert_eq!(observer.recent(5)[0].message, "boom");
    }
}
