//! # In-Memory Cache Store
//!
//! A bounded, TTL-aware response store shared by every request task.
//!
//! ## Structure
//! A single [`RwLock`] guards both the key → entry map and the eviction order, so
//! the two are never observed out of step. The eviction order is a `BTreeMap`
//! keyed by a monotonically increasing insertion sequence; every live key owns
//! exactly one sequence number, and re-inserting a key retires its old number
//! before taking a new one. Eviction pops the smallest sequence, which is always
//! the least recently *inserted* live key.
//!
//! ## Expiry
//! Expiry is lazy: an entry whose age exceeds its TTL is treated as absent by
//! every read. `get` detects expiry under the read lock, then re-acquires the
//! lock exclusively and removes the entry only if the same insertion is still
//! present, so racing lookups of one expired key remove it at most once.
//! Reads never refresh TTL or reorder eviction (insertion order, not LRU).
//!
//! No I/O happens while the lock is held; logging is done after release.

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

use super::stats::{CacheStats, StatsCounters};
use crate::observability::metrics;

/// A cached upstream response. Immutable once created.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    ttl: Duration,
    created_at: Instant,
}

impl CacheEntry {
    /// Create an entry stamped with the current time
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes, ttl: Duration) -> Self {
        Self {
            status,
            headers,
            body,
            ttl,
            created_at: Instant::now(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time since the entry was created
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Expired once `now - created > ttl`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

#[derive(Debug)]
struct Slot {
    entry: Arc<CacheEntry>,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Slot>,
    /// insertion sequence -> key, one record per live key
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl Inner {
    fn insert(&mut self, key: String, entry: Arc<CacheEntry>) {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.order.insert(seq, key.clone());
        if let Some(previous) = self.entries.insert(key, Slot { entry, seq }) {
            self.order.remove(&previous.seq);
        }
    }

    fn remove(&mut self, key: &str) -> Option<Slot> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.seq);
        Some(slot)
    }

    fn pop_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }

    fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.order.clear();
        removed
    }
}

/// Bounded, TTL-aware, thread-safe response cache
#[derive(Debug)]
pub struct CacheStore {
    inner: RwLock<Inner>,
    max_entries: usize,
    counters: StatsCounters,
}

impl CacheStore {
    /// Create a store holding at most `max_entries` responses (minimum 1)
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_entries: max_entries.max(1),
            counters: StatsCounters::default(),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Look up a live entry. Expired entries are removed and reported as absent.
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let expired_seq = {
            let inner = self.inner.read();
            match inner.entries.get(key) {
                None => {
                    StatsCounters::incr(&self.counters.misses, 1);
                    return None;
                }
                Some(slot) if !slot.entry.is_expired() => {
                    StatsCounters::incr(&self.counters.hits, 1);
                    return Some(Arc::clone(&slot.entry));
                }
                Some(slot) => slot.seq,
            }
        };

        let removed = {
            let mut inner = self.inner.write();
            let current = inner
                .entries
                .get(key)
                .map(|slot| (slot.seq, Arc::clone(&slot.entry)));

            match current {
                Some((seq, _)) if seq == expired_seq => inner.remove(key).is_some(),
                // replaced by a fresh insert between the two lock sections
                Some((_, entry)) if !entry.is_expired() => {
                    StatsCounters::incr(&self.counters.hits, 1);
                    return Some(entry);
                }
                _ => false,
            }
        };

        if removed {
            StatsCounters::incr(&self.counters.expirations, 1);
            metrics::record_expirations(1);
            debug!(cache_key = %key, "Removed expired cache entry");
        }
        StatsCounters::incr(&self.counters.misses, 1);
        None
    }

    /// Insert or replace an entry. A new key arriving at capacity evicts the
    /// oldest inserted key first; replacing an existing key never evicts.
    pub fn set(&self, key: impl Into<String>, entry: CacheEntry) {
        let key = key.into();
        let entry = Arc::new(entry);

        let evicted = {
            let mut inner = self.inner.write();
            let is_new = !inner.entries.contains_key(&key);
            let evicted = if is_new && inner.entries.len() >= self.max_entries {
                inner.pop_oldest()
            } else {
                None
            };
            inner.insert(key, entry);
            evicted
        };

        StatsCounters::incr(&self.counters.inserts, 1);
        if let Some(evicted_key) = evicted {
            StatsCounters::incr(&self.counters.evictions, 1);
            metrics::record_eviction();
            debug!(cache_key = %evicted_key, "Evicted oldest cache entry");
        }
    }

    /// Remove a single key, returning whether it was present
    pub fn remove(&self, key: &str) -> bool {
        self.inner.write().remove(key).is_some()
    }

    /// Empty the store, returning the number of entries dropped
    pub fn clear(&self) -> usize {
        let removed = self.inner.write().clear();
        StatsCounters::incr(&self.counters.clears, 1);
        debug!(removed, "Cache cleared");
        removed
    }

    /// Whether `key` currently maps to a live entry. Does not touch counters.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner
            .read()
            .entries
            .get(key)
            .map(|slot| !slot.entry.is_expired())
            .unwrap_or(false)
    }

    /// Entries physically held, including expired ones not yet removed
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let removed = {
            let mut inner = self.inner.write();
            let expired: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, slot)| slot.entry.is_expired_at(now))
                .map(|(key, _)| key.clone())
                .collect();

            for key in &expired {
                inner.remove(key);
            }
            expired.len()
        };

        if removed > 0 {
            StatsCounters::incr(&self.counters.expirations, removed as u64);
            metrics::record_expirations(removed as u64);
            debug!(removed, "Purged expired cache entries");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.len(), self.max_entries)
    }

    /// Periodically purge expired entries. The task stops once the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // the first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(live) = store.upgrade() else {
                    break;
                };
                live.purge_expired();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn entry(body: &'static str, ttl: Duration) -> CacheEntry {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "text/plain".parse().unwrap());
        CacheEntry::new(StatusCode::OK, headers, Bytes::from_static(body.as_bytes()), ttl)
    }

    const LONG: Duration = Duration::from_secs(60);

    #[test]
    fn test_basic_operations() {
        let store = CacheStore::new(10);
        assert!(store.get("missing").is_none());

        store.set("key", entry("value", LONG));
        let cached = store.get("key").unwrap();
        assert_eq!(cached.body(), &Bytes::from_static(b"value"));
        assert_eq!(cached.status(), StatusCode::OK);
        assert_eq!(cached.headers().get("content-type").unwrap(), "text/plain");
        assert!(store.contains_key("key"));

        assert!(store.remove("key"));
        assert!(!store.contains_key("key"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_expiry_boundary() {
        let e = entry("v", Duration::from_secs(5));
        let created = e.created_at();
        assert!(!e.is_expired_at(created + Duration::from_secs(5)));
        assert!(e.is_expired_at(created + Duration::from_secs(5) + Duration::from_millis(1)));
    }

    #[test]
    fn test_expired_entry_is_removed_on_get() {
        let store = CacheStore::new(10);
        store.set("key", entry("value", Duration::from_millis(20)));
        thread::sleep(Duration::from_millis(50));

        assert_eq!(store.len(), 1);
        assert!(!store.contains_key("key"));
        assert!(store.get("key").is_none());
        assert_eq!(store.len(), 0);

        let stats = store.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_reads_do_not_refresh_ttl() {
        let store = CacheStore::new(10);
        store.set("key", entry("value", Duration::from_millis(60)));
        thread::sleep(Duration::from_millis(30));
        assert!(store.get("key").is_some());
        thread::sleep(Duration::from_millis(50));
        assert!(store.get("key").is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest_insert() {
        let store = CacheStore::new(2);
        store.set("a", entry("A", LONG));
        store.set("b", entry("B", LONG));
        store.set("c", entry("C", LONG));

        assert_eq!(store.len(), 2);
        assert!(!store.contains_key("a"));
        assert!(store.contains_key("b"));
        assert!(store.contains_key("c"));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_reads_do_not_change_eviction_order() {
        let store = CacheStore::new(2);
        store.set("a", entry("A", LONG));
        store.set("b", entry("B", LONG));
        assert!(store.get("a").is_some());

        store.set("c", entry("C", LONG));
        assert!(!store.contains_key("a"));
        assert!(store.contains_key("b"));
    }

    #[test]
    fn test_reinsert_keeps_single_order_record() {
        let store = CacheStore::new(2);
        store.set("a", entry("A1", LONG));
        store.set("b", entry("B", LONG));
        // replacing an existing key at capacity evicts nothing
        store.set("a", entry("A2", LONG));
        assert_eq!(store.len(), 2);
        assert_eq!(store.stats().evictions, 0);

        // "a" now sits behind "b", so "b" is the oldest insert
        store.set("c", entry("C", LONG));
        assert!(store.contains_key("a"));
        assert!(!store.contains_key("b"));
        assert_eq!(store.get("a").unwrap().body(), &Bytes::from_static(b"A2"));

        // with a duplicate record "a" would be evicted here while still live
        store.set("d", entry("D", LONG));
        assert!(!store.contains_key("a"));
        assert!(store.contains_key("c"));
        assert!(store.contains_key("d"));

        let inner = store.inner.read();
        assert_eq!(inner.order.len(), inner.entries.len());
    }

    #[test]
    fn test_clear() {
        let store = CacheStore::new(10);
        for i in 0..5 {
            store.set(format!("key_{}", i), entry("v", LONG));
        }

        assert_eq!(store.clear(), 5);
        assert!(store.is_empty());
        assert!(store.get("key_0").is_none());
        assert!(store.inner.read().order.is_empty());

        // store keeps working after a clear
        store.set("key_0", entry("v", LONG));
        assert!(store.get("key_0").is_some());
        assert_eq!(store.stats().clears, 1);
    }

    #[test]
    fn test_purge_expired() {
        let store = CacheStore::new(10);
        store.set("short", entry("s", Duration::from_millis(10)));
        store.set("long", entry("l", LONG));
        thread::sleep(Duration::from_millis(30));

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains_key("long"));
        assert_eq!(store.inner.read().order.len(), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let store = CacheStore::new(0);
        assert_eq!(store.max_entries(), 1);
        store.set("a", entry("A", LONG));
        store.set("b", entry("B", LONG));
        assert_eq!(store.len(), 1);
        assert!(store.contains_key("b"));
    }

    #[test]
    fn test_concurrent_lookups_of_expired_key_remove_once() {
        let store = Arc::new(CacheStore::new(10));
        store.set("key", entry("value", Duration::from_millis(5)));
        thread::sleep(Duration::from_millis(20));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.get("key").is_none())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(store.stats().expirations, 1);
        assert!(store.is_empty());
        assert!(store.inner.read().order.is_empty());
    }

    #[test]
    fn test_stats_track_lookups() {
        let store = CacheStore::new(10);
        store.set("key", entry("v", LONG));
        store.get("key");
        store.get("key");
        store.get("other");

        let stats = store.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.max_entries, 10);
    }

    #[tokio::test]
    async fn test_sweeper_purges_in_background() {
        let store = Arc::new(CacheStore::new(10));
        store.set("key", entry("v", Duration::from_millis(10)));
        let handle = store.spawn_sweeper(Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.len(), 0);

        drop(store);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop once the store is dropped")
            .unwrap();
    }
}
