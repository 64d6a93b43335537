// ── Generic reactive keyed collection ──
//
// Concurrent storage with O(1) lookups and push-based change
// notification via `watch` channels.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// A reactive collection for a single item type, keyed by string.
///
/// Every mutation that changes something bumps a version counter and
/// rebuilds the snapshot subscribers receive. Snapshots are ordered by
/// key so observers see a stable listing.
pub(crate) struct KeyedCollection<T: Clone + Send + Sync + 'static> {
    by_key: DashMap<String, Arc<T>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> KeyedCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or update an item. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: String, item: T) -> bool {
        let is_new = self.by_key.insert(key, Arc::new(item)).is_none();
        self.publish();
        is_new
    }

    /// Replace an item that is already present. Returns `false`, without
    /// touching the collection or notifying anyone, if `key` is absent.
    pub(crate) fn update_existing(&self, key: &str, f: impl FnOnce(&T) -> T) -> bool {
        {
            let Some(mut entry) = self.by_key.get_mut(key) else {
                return false;
            };
            let updated = f(entry.value());
            *entry.value_mut() = Arc::new(updated);
        }
        // The shard guard is released before the snapshot iterates.
        self.publish();
        true
    }

    /// Swap the whole contents for `items` with a single notification.
    ///
    /// New entries go in before stale keys are removed, so a key present
    /// both before and after never reads as missing mid-swap.
    pub(crate) fn replace_all(&self, items: impl IntoIterator<Item = (String, T)>) {
        let mut keep = HashSet::new();
        for (key, item) in items {
            self.by_key.insert(key.clone(), Arc::new(item));
            keep.insert(key);
        }
        self.by_key.retain(|key, _| keep.contains(key));
        self.publish();
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Rebuild and send the snapshot. Callers must not hold a map guard.
    fn publish(&self) {
        // Rebuilt under the channel's write lock: concurrent publishes are
        // serialized and the last one sent reflects every mutation before it.
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| {
            let mut entries: Vec<(String, Arc<T>)> = self
                .by_key
                .iter()
                .map(|r| (r.key().clone(), Arc::clone(r.value())))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            *snap = Arc::new(entries.into_iter().map(|(_, v)| v).collect());
        });
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn upsert_reports_new_keys() {
        let col: KeyedCollection<String> = KeyedCollection::new();
        assert!(col.upsert("a".into(), "x".into()));
        assert!(!col.upsert("a".into(), "y".into()));
        assert_eq!(*col.get("a").unwrap(), "y");
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn update_existing_ignores_unknown_keys() {
        let col: KeyedCollection<String> = KeyedCollection::new();
        col.upsert("a".into(), "x".into());
        let version = col.version();
        let mut rx = col.subscribe();
        rx.borrow_and_update();

        assert!(!col.update_existing("b", |_| "nope".into()));
        assert_eq!(col.version(), version);
        assert!(!rx.has_changed().unwrap());
        assert!(!col.contains("b"));

        assert!(col.update_existing("a", |old| format!("{old}!")));
        assert_eq!(*col.get("a").unwrap(), "x!");
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn keys_kept_by_replace_all_never_disappear() {
        let col: Arc<KeyedCollection<u32>> = Arc::new(KeyedCollection::new());
        let batch = || (0..200).map(|i| (format!("k{i:03}"), i));
        col.replace_all(batch());

        let writer = {
            let col = Arc::clone(&col);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    col.replace_all(batch());
                }
            })
        };
        let mut misses = 0;
        while !writer.is_finished() {
            if col.get("k199").is_none() || !col.update_existing("k000", |v| *v) {
                misses += 1;
            }
        }
        writer.join().unwrap();

        assert_eq!(misses, 0);
        assert_eq!(col.snapshot().len(), 200);
    }

    #[test]
    fn replace_all_drops_missing_keys() {
        let col: KeyedCollection<u32> = KeyedCollection::new();
        col.upsert("old".into(), 1);
        col.replace_all([("b".to_owned(), 2), ("a".to_owned(), 3)]);

        assert!(col.get("old").is_none());
        let snap: Vec<u32> = col.snapshot().iter().map(|v| **v).collect();
        assert_eq!(snap, vec![3, 2], "snapshot is ordered by key");
    }
}
