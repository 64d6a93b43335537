// ── Subscriptions ──
//
// A subscription remembers the last snapshot it handed out. For tracked
// entities that is enough to say who went outside or came in since the
// caller last looked, which is what hosts actually print or notify on.

use std::collections::HashMap;
use std::sync::Arc;

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::{EntityState, Rule, TrackedEntity};

type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// Live view of one repository collection. Snapshots are sorted by key.
pub struct Subscription<T> {
    seen: Snapshot<T>,
    receiver: watch::Receiver<Snapshot<T>>,
}

pub type EntitySubscription = Subscription<TrackedEntity>;
pub type RuleSubscription = Subscription<Rule>;

impl<T: Send + Sync + 'static> Subscription<T> {
    pub(crate) fn new(mut receiver: watch::Receiver<Snapshot<T>>) -> Self {
        let seen = receiver.borrow_and_update().clone();
        Self { seen, receiver }
    }

    /// The snapshot handed out last (at creation or by `changed()`).
    pub fn seen(&self) -> &Snapshot<T> {
        &self.seen
    }

    pub fn latest(&self) -> Snapshot<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the repository is gone.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        self.receiver.changed().await.ok()?;
        self.seen = self.receiver.borrow_and_update().clone();
        Some(Arc::clone(&self.seen))
    }

    /// Every snapshot from now on, starting with the current one.
    pub fn into_stream(self) -> impl Stream<Item = Snapshot<T>> + Unpin {
        WatchStream::new(self.receiver)
    }
}

// ── Entity transitions ───────────────────────────────────────────────

/// An entity whose state differs from what the subscriber saw before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub name: String,
    /// `None` when the subscriber had not seen this entity yet.
    pub from: Option<EntityState>,
    pub to: EntityState,
}

impl Transition {
    pub fn went_outside(&self) -> bool {
        self.to == EntityState::Outside && self.from != Some(EntityState::Outside)
    }
}

impl Subscription<TrackedEntity> {
    /// Wait for the next change and report the entities that moved.
    /// The list is empty when only metadata changed.
    pub async fn next_transitions(&mut self) -> Option<Vec<Transition>> {
        let before = Arc::clone(&self.seen);
        let after = self.changed().await?;
        Some(transitions(&before, &after))
    }

    /// State of `name` in the last seen snapshot.
    pub fn state_of(&self, name: &str) -> Option<EntityState> {
        self.seen
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .and_then(|i| self.seen.get(i))
            .map(|e| e.state)
    }
}

fn transitions(before: &[Arc<TrackedEntity>], after: &[Arc<TrackedEntity>]) -> Vec<Transition> {
    let previous: HashMap<&str, EntityState> =
        before.iter().map(|e| (e.name.as_str(), e.state)).collect();

    after
        .iter()
        .filter_map(|e| {
            let from = previous.get(e.name.as_str()).copied();
            (from != Some(e.state)).then(|| Transition {
                name: e.name.clone(),
                from,
                to: e.state,
            })
        })
        .collect()
}
