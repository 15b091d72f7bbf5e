// rendezvous/src/store.rs
// A generic in-process expiring key-value store. Every piece of server-side
// state in this component — invites, presence records, rate-limit counters —
// is a TTL'd entry here; nothing is ever written to disk.
//
// Expiry is lazy: an expired entry is simply invisible to readers (`get`,
// `retain_live`) even if `cleanup` hasn't swept it out yet. This matches the
// spec's presence-record invariant directly and lets `redeem` stay a single
// lock acquisition (read + conditional remove) for the at-most-once
// guarantee invite redemption needs.

use std::collections::HashMap;
use std::hash::Hash;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A TTL'd map. Cloning the store clones the `Arc` the caller wraps it in,
/// not the map itself — construct one `ExpiringStore` per logical namespace
/// (one for invites, one for rate-limit counters, one per room for
/// presence) and share it behind `Arc`.
pub struct ExpiringStore<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert or overwrite `key`, resetting its TTL. Used for idempotent
    /// presence refresh as well as first insertion.
    pub async fn insert(&self, key: K, value: V, ttl: Duration) {
        let mut guard = self.entries.lock().await;
        guard.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Insert `key` only if it is absent or already expired. Returns `false`
    /// (without touching the store) if a live entry already occupies `key` —
    /// used to detect share-code collisions so the caller can regenerate.
    pub async fn insert_if_absent(&self, key: K, value: V, ttl: Duration) -> bool {
        let mut guard = self.entries.lock().await;
        let now = Instant::now();
        let occupied = guard.get(&key).is_some_and(|e| e.expires_at > now);
        if occupied {
            return false;
        }
        guard.insert(
            key,
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        true
    }

    /// Fetch a live value, if any. Expired-but-not-yet-swept entries read
    /// as absent.
    pub async fn get(&self, key: &K) -> Option<V> {
        let guard = self.entries.lock().await;
        let now = Instant::now();
        guard
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone())
    }

    /// Atomically read-and-remove a live value. Under concurrent callers
    /// racing the same key, exactly one observes `Some` — the lock
    /// serializes the check-and-remove, so this is the at-most-once
    /// primitive invite redemption is built on.
    pub async fn take(&self, key: &K) -> Option<V> {
        let mut guard = self.entries.lock().await;
        let now = Instant::now();
        match guard.get(key) {
            Some(e) if e.expires_at > now => guard.remove(key).map(|e| e.value),
            Some(_) => {
                // Present but expired: treat as absent and sweep it while we're here.
                guard.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn remove(&self, key: &K) {
        let mut guard = self.entries.lock().await;
        guard.remove(key);
    }

    /// All live values, for callers that need to enumerate (e.g. `list_peers`).
    pub async fn values_live(&self) -> Vec<V> {
        let guard = self.entries.lock().await;
        let now = Instant::now();
        guard
            .values()
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone())
            .collect()
    }

    /// Sweep expired entries. Not required for correctness (reads already
    /// filter on expiry) — bounds memory for keys that are written once and
    /// never read again, e.g. rate-limit counters for IPs that stop calling.
    pub async fn sweep_expired(&self) {
        let mut guard = self.entries.lock().await;
        let now = Instant::now();
        guard.retain(|_, e| e.expires_at > now);
    }

    pub async fn len_live(&self) -> usize {
        let guard = self.entries.lock().await;
        let now = Instant::now();
        guard.values().filter(|e| e.expires_at > now).count()
    }
}

impl<K, V> Default for ExpiringStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn insert_then_get_round_trips() {
        let store: ExpiringStore<String, i32> = ExpiringStore::new();
        store.insert("a".into(), 1, Duration::from_secs(60)).await;
        assert_eq!(store.get(&"a".to_string()).await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store: ExpiringStore<String, i32> = ExpiringStore::new();
        store.insert("a".into(), 1, Duration::from_secs(10)).await;
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.get(&"a".to_string()).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn take_is_at_most_once() {
        let store: ExpiringStore<String, i32> = ExpiringStore::new();
        store.insert("code".into(), 42, Duration::from_secs(300)).await;

        let first = store.take(&"code".to_string()).await;
        let second = store.take(&"code".to_string()).await;

        assert_eq!(first, Some(42));
        assert_eq!(second, None);
    }

    #[tokio::test(start_paused = true)]
    async fn take_on_expired_entry_is_none() {
        let store: ExpiringStore<String, i32> = ExpiringStore::new();
        store.insert("code".into(), 42, Duration::from_secs(5)).await;
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.take(&"code".to_string()).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn insert_if_absent_rejects_live_collision() {
        let store: ExpiringStore<String, i32> = ExpiringStore::new();
        assert!(store.insert_if_absent("k".into(), 1, Duration::from_secs(60)).await);
        assert!(!store.insert_if_absent("k".into(), 2, Duration::from_secs(60)).await);
        assert_eq!(store.get(&"k".to_string()).await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn insert_if_absent_allows_reuse_after_expiry() {
        let store: ExpiringStore<String, i32> = ExpiringStore::new();
        assert!(store.insert_if_absent("k".into(), 1, Duration::from_secs(5)).await);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.insert_if_absent("k".into(), 2, Duration::from_secs(60)).await);
        assert_eq!(store.get(&"k".to_string()).await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn values_live_excludes_expired() {
        let store: ExpiringStore<String, i32> = ExpiringStore::new();
        store.insert("a".into(), 1, Duration::from_secs(5)).await;
        store.insert("b".into(), 2, Duration::from_secs(60)).await;
        tokio::time::advance(Duration::from_secs(6)).await;
        let values = store.values_live().await;
        assert_eq!(values, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_expired_entries() {
        let store: ExpiringStore<String, i32> = ExpiringStore::new();
        store.insert("a".into(), 1, Duration::from_secs(5)).await;
        tokio::time::advance(Duration::from_secs(6)).await;
        store.sweep_expired().await;
        assert_eq!(store.len_live().await, 0);
    }
}
