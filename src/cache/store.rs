//! Keyed TTL cache with size bound and optional disk persistence

use super::{Clock, DiskStore, SystemClock};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default capacity per namespace
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Default entry lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// A cached value with its creation time and lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    /// Cache key
    pub key: String,
    /// Cached value
    pub value: T,
    /// Creation time (Unix ms)
    pub created_at: i64,
    /// Lifetime in milliseconds
    pub ttl_ms: u64,
    /// Fingerprint of the request that produced the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_hash: Option<String>,
}

impl<T> CacheEntry<T> {
    /// True once `now - created_at > ttl`
    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis.saturating_sub(self.created_at) > self.ttl_ms.min(i64::MAX as u64) as i64
    }

    /// Creation time as a timestamp
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.created_at).single()
    }
}

/// Cache statistics for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Live entries
    pub total_entries: usize,
    /// Approximate serialized size of all values in bytes
    pub total_size: usize,
    /// `get` calls that returned a value since the last clear
    pub hits: u64,
    /// `get` calls that returned nothing since the last clear
    pub misses: u64,
    /// `hits / (hits + misses)`, 0 without requests
    pub hit_rate: f64,
    /// Creation time of the oldest entry
    pub oldest_entry: Option<DateTime<Utc>>,
    /// Creation time of the newest entry
    pub newest_entry: Option<DateTime<Utc>>,
}

/// Cache construction parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Namespace, used in log records and as the disk subdirectory name
    pub namespace: String,
    /// Capacity; the oldest entry is evicted beyond this
    pub max_entries: usize,
    /// Lifetime used when `set` is called without one
    pub default_ttl: Duration,
    /// Directory for persisted entries; memory-only when `None`
    pub persist_dir: Option<PathBuf>,
}

impl CacheConfig {
    /// In-memory namespace with default capacity and TTL
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl: DEFAULT_TTL,
            persist_dir: None,
        }
    }

    /// Set the capacity
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the default lifetime
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Persist entries under `dir`
    pub fn with_persist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persist_dir = Some(dir.into());
        self
    }
}

#[derive(Debug)]
struct Slot<T> {
    entry: CacheEntry<T>,
    size: usize,
}

/// Keyed, TTL-expiring, size-bounded store.
///
/// The in-memory map is the source of truth. When a persist directory is
/// configured, writes are mirrored to disk on a best-effort basis: disk
/// failures are logged and the cache keeps working from memory.
#[derive(Debug)]
pub struct Cache<T> {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Slot<T>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    disk: Option<DiskStore>,
}

impl<T> Cache<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    /// Create a cache on the system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache on a custom clock; reloads live entries from disk
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let disk = config.persist_dir.clone().map(DiskStore::new);
        let cache = Self {
            config,
            clock,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            disk,
        };
        cache.warm_from_disk();
        cache
    }

    /// Namespace name
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Default lifetime
    pub fn default_ttl(&self) -> Duration {
        self.config.default_ttl
    }

    /// Look up a live value
    pub fn get(&self, key: &str) -> Option<T> {
        self.get_if(key, |_| true)
    }

    /// Look up a live value whose entry satisfies `is_valid`.
    ///
    /// An entry that fails `is_valid` is evicted and the lookup counts as a
    /// miss.
    pub fn get_if<P>(&self, key: &str, is_valid: P) -> Option<T>
    where
        P: FnOnce(&CacheEntry<T>) -> bool,
    {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock();

        let verdict = entries
            .get(key)
            .map(|slot| !slot.entry.is_expired(now) && is_valid(&slot.entry));

        match verdict {
            Some(true) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                entries.get(key).map(|slot| slot.entry.value.clone())
            }
            Some(false) => {
                entries.remove(key);
                self.persist_removal(&entries, key, now);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a value with the default or given lifetime
    pub fn set(&self, key: impl Into<String>, value: T, ttl: Option<Duration>) {
        self.set_with_context(key, value, ttl, None);
    }

    /// Store a value tagged with the fingerprint of the request that produced it
    pub fn set_with_context(
        &self,
        key: impl Into<String>,
        value: T,
        ttl: Option<Duration>,
        context_hash: Option<String>,
    ) {
        let key = key.into();
        let now = self.clock.now_millis();
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let size = serde_json::to_vec(&value).map(|v| v.len()).unwrap_or(0);
        let entry = CacheEntry {
            key: key.clone(),
            value,
            created_at: now,
            ttl_ms: ttl.as_millis().min(u64::MAX as u128) as u64,
            context_hash,
        };

        let mut entries = self.entries.lock();
        let capacity = self.config.max_entries.max(1);
        if !entries.contains_key(&key) && entries.len() >= capacity {
            if let Some(oldest) = oldest_key(&entries) {
                debug!(namespace = %self.config.namespace, key = %oldest, "evicting oldest entry");
                entries.remove(&oldest);
                if let Some(disk) = &self.disk {
                    if let Err(e) = disk.remove_entry(&oldest) {
                        self.log_disk_error("remove evicted entry", &e);
                    }
                }
            }
        }

        if let Some(disk) = &self.disk {
            if let Err(e) = disk.write_entry(&entry) {
                self.log_disk_error("write entry", &e);
            }
        }
        entries.insert(key, Slot { entry, size });
        self.persist_index(&entries, now);
    }

    /// True when a live entry exists; does not touch hit/miss counters
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(slot) if slot.entry.is_expired(now) => {
                entries.remove(key);
                self.persist_removal(&entries, key, now);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Remove an entry; returns whether one existed
    pub fn delete(&self, key: &str) -> bool {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock();
        let existed = entries.remove(key).is_some();
        if existed {
            self.persist_removal(&entries, key, now);
        }
        existed
    }

    /// Remove every entry that matches `predicate`; returns how many
    pub fn remove_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&str, &T) -> bool,
    {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, slot)| predicate(key, &slot.entry.value))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            entries.remove(key);
            if let Some(disk) = &self.disk {
                if let Err(e) = disk.remove_entry(key) {
                    self.log_disk_error("remove entry", &e);
                }
            }
        }
        if !doomed.is_empty() {
            self.persist_index(&entries, now);
        }
        doomed.len()
    }

    /// Drop expired entries; returns how many
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let expired: Vec<String> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        let expired = expired.into_iter().collect::<std::collections::HashSet<_>>();
        self.remove_where(|key, _| expired.contains(key))
    }

    /// Remove everything and reset hit/miss counters
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.clear() {
                self.log_disk_error("clear", &e);
            }
        }
    }

    /// Live keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now_millis();
        let entries = self.entries.lock();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, slot)| !slot.entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of stored entries (expired ones included until touched)
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creation time of the live entry for `key`
    pub fn entry_timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        let now = self.clock.now_millis();
        self.entries
            .lock()
            .get(key)
            .filter(|slot| !slot.entry.is_expired(now))
            .and_then(|slot| slot.entry.created_at_utc())
    }

    /// Snapshot of counters and contents
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let requests = hits + misses;

        CacheStats {
            total_entries: entries.len(),
            total_size: entries.values().map(|slot| slot.size).sum(),
            hits,
            misses,
            hit_rate: if requests == 0 {
                0.0
            } else {
                hits as f64 / requests as f64
            },
            oldest_entry: entries
                .values()
                .map(|slot| slot.entry.created_at)
                .min()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            newest_entry: entries
                .values()
                .map(|slot| slot.entry.created_at)
                .max()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        }
    }

    fn warm_from_disk(&self) {
        let Some(disk) = &self.disk else {
            return;
        };

        let loaded = match disk.load::<T>() {
            Ok(loaded) => loaded,
            Err(e) => {
                self.log_disk_error("load", &e);
                return;
            }
        };

        let now = self.clock.now_millis();
        let mut entries = self.entries.lock();
        let mut stale = 0;
        for entry in loaded {
            if entry.is_expired(now) {
                stale += 1;
                if let Err(e) = disk.remove_entry(&entry.key) {
                    self.log_disk_error("remove expired entry", &e);
                }
                continue;
            }
            let size = serde_json::to_vec(&entry.value).map(|v| v.len()).unwrap_or(0);
            entries.insert(entry.key.clone(), Slot { entry, size });
        }

        let mut trimmed = 0;
        while entries.len() > self.config.max_entries.max(1) {
            let Some(oldest) = oldest_key(&entries) else {
                break;
            };
            entries.remove(&oldest);
            trimmed += 1;
            if let Err(e) = disk.remove_entry(&oldest) {
                self.log_disk_error("remove trimmed entry", &e);
            }
        }

        debug!(
            namespace = %self.config.namespace,
            loaded = entries.len(),
            stale,
            trimmed,
            "warmed cache from disk"
        );
        if stale + trimmed > 0 {
            self.persist_index(&entries, now);
        }
    }

    fn persist_removal(&self, entries: &HashMap<String, Slot<T>>, key: &str, now: i64) {
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.remove_entry(key) {
                self.log_disk_error("remove entry", &e);
            }
            self.persist_index(entries, now);
        }
    }

    fn persist_index(&self, entries: &HashMap<String, Slot<T>>, now: i64) {
        if let Some(disk) = &self.disk {
            let mut keys: Vec<String> = entries.keys().cloned().collect();
            keys.sort();
            if let Err(e) = disk.write_index(&keys, now) {
                self.log_disk_error("write index", &e);
            }
        }
    }

    fn log_disk_error(&self, operation: &str, error: &std::io::Error) {
        warn!(
            namespace = %self.config.namespace,
            operation,
            error = %error,
            "cache persistence failed, continuing in memory"
        );
    }
}

/// Key of the entry with the smallest creation time (ties broken by key)
fn oldest_key<T>(entries: &HashMap<String, Slot<T>>) -> Option<String> {
    entries
        .iter()
        .min_by(|(ka, a), (kb, b)| {
            a.entry
                .created_at
                .cmp(&b.entry.created_at)
                .then_with(|| ka.cmp(kb))
        })
        .map(|(key, _)| key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn cache_with(clock: &Arc<ManualClock>, config: CacheConfig) -> Cache<String> {
        Cache::with_clock(config, clock.clone())
    }

    #[test]
    fn test_set_then_get() {
        let clock = clock();
        let cache = cache_with(&clock, CacheConfig::new("test"));
        cache.set("lodash", "4.17.21".to_string(), None);
        assert_eq!(cache.get("lodash"), Some("4.17.21".to_string()));
        assert!(cache.has("lodash"));
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let clock = clock();
        let cache = cache_with(&clock, CacheConfig::new("test"));
        cache.set("k", "v".to_string(), Some(Duration::from_secs(10)));

        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.get("k"), Some("v".to_string()));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("k"), None);
        assert!(!cache.has("k"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_has_removes_expired_entry() {
        let clock = clock();
        let cache = cache_with(&clock, CacheConfig::new("test"));
        cache.set("k", "v".to_string(), Some(Duration::from_secs(1)));
        clock.advance(Duration::from_secs(2));
        assert!(!cache.has("k"));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_evicts_oldest_entry() {
        let clock = clock();
        let cache = cache_with(&clock, CacheConfig::new("test").with_max_entries(3));
        for key in ["a", "b", "c"] {
            cache.set(key, key.to_string(), None);
            clock.advance(Duration::from_millis(10));
        }
        // Reading "a" does not protect it: eviction is by creation time
        assert!(cache.get("a").is_some());
        cache.set("d", "d".to_string(), None);

        assert_eq!(cache.len(), 3);
        assert!(!cache.has("a"));
        assert_eq!(cache.keys(), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let clock = clock();
        let cache = cache_with(&clock, CacheConfig::new("test").with_max_entries(2));
        cache.set("a", "1".to_string(), None);
        cache.set("b", "2".to_string(), None);
        cache.set("a", "3".to_string(), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some("3".to_string()));
        assert!(cache.has("b"));
    }

    #[test]
    fn test_hit_rate() {
        let clock = clock();
        let cache = cache_with(&clock, CacheConfig::new("test"));
        assert_eq!(cache.stats().hit_rate, 0.0);

        cache.set("a", "1".to_string(), None);
        cache.get("a");
        cache.get("a");
        cache.get("a");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits + stats.misses, 4);
        assert_eq!(stats.hit_rate, 0.75);
    }

    #[test]
    fn test_clear_resets_counters() {
        let clock = clock();
        let cache = cache_with(&clock, CacheConfig::new("test"));
        cache.set("a", "1".to_string(), None);
        cache.get("a");
        cache.get("b");
        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert!(stats.oldest_entry.is_none());
    }

    #[test]
    fn test_stats_timestamps_and_size() {
        let clock = clock();
        let start = clock.now();
        let cache = cache_with(&clock, CacheConfig::new("test"));
        cache.set("a", "xx".to_string(), None);
        clock.advance(Duration::from_secs(5));
        cache.set("b", "yyyy".to_string(), None);

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 2);
        // JSON strings include their quotes
        assert_eq!(stats.total_size, 4 + 6);
        assert_eq!(stats.oldest_entry, Some(start));
        assert_eq!(stats.newest_entry, Some(start + chrono::Duration::seconds(5)));
        assert_eq!(cache.entry_timestamp("a"), Some(start));
    }

    #[test]
    fn test_get_if_evicts_mismatched_entry() {
        let clock = clock();
        let cache = cache_with(&clock, CacheConfig::new("test"));
        cache.set_with_context("k", "v".to_string(), None, Some("hash-1".to_string()));

        let hit = cache.get_if("k", |entry| entry.context_hash.as_deref() == Some("hash-1"));
        assert_eq!(hit, Some("v".to_string()));

        let miss = cache.get_if("k", |entry| entry.context_hash.as_deref() == Some("hash-2"));
        assert_eq!(miss, None);
        assert!(!cache.has("k"));
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_delete_and_remove_where() {
        let clock = clock();
        let cache = cache_with(&clock, CacheConfig::new("test"));
        cache.set("a", "react".to_string(), None);
        cache.set("b", "vue".to_string(), None);
        cache.set("c", "react-dom".to_string(), None);

        assert!(cache.delete("b"));
        assert!(!cache.delete("b"));
        assert_eq!(cache.remove_where(|_, v| v.starts_with("react")), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let clock = clock();
        let cache = cache_with(&clock, CacheConfig::new("test"));
        cache.set("short", "1".to_string(), Some(Duration::from_secs(1)));
        cache.set("long", "2".to_string(), Some(Duration::from_secs(100)));
        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.keys(), vec!["long"]);
    }

    #[test]
    fn test_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let clock = clock();
        let config = CacheConfig::new("registry").with_persist_dir(dir.path());

        {
            let cache = cache_with(&clock, config.clone());
            cache.set("lodash", "4.17.21".to_string(), Some(Duration::from_secs(60)));
            cache.set("short", "x".to_string(), Some(Duration::from_secs(1)));
            cache.set("gone", "y".to_string(), None);
            cache.delete("gone");
        }

        clock.advance(Duration::from_secs(2));
        let reloaded = cache_with(&clock, config);
        assert_eq!(reloaded.get("lodash"), Some("4.17.21".to_string()));
        assert!(!reloaded.has("short"));
        assert!(!reloaded.has("gone"));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_reload_over_capacity_trims_disk() {
        let dir = TempDir::new().unwrap();
        let clock = clock();
        let config = CacheConfig::new("registry").with_persist_dir(dir.path());

        {
            let cache = cache_with(&clock, config.clone());
            for key in ["a", "b", "c"] {
                cache.set(key, key.to_string(), None);
                clock.advance(Duration::from_millis(10));
            }
        }

        let reloaded = cache_with(&clock, config.with_max_entries(2));
        assert_eq!(reloaded.keys(), vec!["b", "c"]);

        let disk = DiskStore::new(dir.path());
        assert!(!disk.entry_path("a").exists());
        assert!(disk.entry_path("b").exists());
        assert_eq!(disk.read_index().unwrap().keys, vec!["b", "c"]);
    }

    #[test]
    fn test_entry_timestamp_ignores_expired_entry() {
        let clock = clock();
        let start = clock.now();
        let cache = cache_with(&clock, CacheConfig::new("test"));
        cache.set("k", "v".to_string(), Some(Duration::from_secs(1)));
        assert_eq!(cache.entry_timestamp("k"), Some(start));

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.entry_timestamp("k"), None);
    }

    #[test]
    fn test_clear_removes_disk_files() {
        let dir = TempDir::new().unwrap();
        let clock = clock();
        let config = CacheConfig::new("analysis").with_persist_dir(dir.path());
        let cache = cache_with(&clock, config.clone());
        cache.set("a", "1".to_string(), None);
        cache.clear();

        let reloaded = cache_with(&clock, config);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_unwritable_dir_degrades_to_memory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let clock = clock();
        let cache = cache_with(
            &clock,
            CacheConfig::new("test").with_persist_dir(blocker.join("nested")),
        );
        cache.set("a", "1".to_string(), None);
        assert_eq!(cache.get("a"), Some("1".to_string()));
        assert!(cache.delete("a"));
        cache.clear();
    }
}
