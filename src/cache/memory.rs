//! In-memory cache on a concurrent map.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::cache::{Cache, CacheError, Ttl};

pub(crate) const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Thread-safe in-memory cache. Cloning shares the same entries.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, Entry>>,
    closed: Arc<AtomicBool>,
    sweeper: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired key. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    /// Purge expired keys every `interval` until the cache is closed.
    pub fn spawn_sweeper(&self, interval: Duration) {
        let cache = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            while !cache.closed.load(Ordering::SeqCst) {
                ticker.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, remaining = cache.len(), "Swept expired cache keys");
                }
            }
        });
        if let Some(previous) = self.lock_sweeper().replace(task) {
            previous.abort();
        }
    }

    fn lock_sweeper(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.sweeper.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_open(&self) -> Result<(), CacheError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::Closed);
        }
        Ok(())
    }

    /// The live entry for `key`; an expired one is removed on the way.
    fn live(&self, key: &str) -> Option<Entry> {
        let now = Instant::now();
        let entry = self.entries.get(key).map(|e| e.value().clone())?;
        if entry.is_live(now) {
            return Some(entry);
        }
        self.entries.remove_if(key, |_, e| !e.is_live(now));
        None
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.get_bytes(key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| CacheError::NotUtf8 { key: key.to_string() }),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, expiration: Option<Duration>) -> Result<(), CacheError> {
        self.set_bytes(key, value.as_bytes().to_vec(), expiration).await
    }

    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.check_open()?;
        Ok(self.live(key).map(|entry| entry.value))
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, expiration: Option<Duration>) -> Result<(), CacheError> {
        self.check_open()?;
        let expires_at = expiration.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.check_open()?;
        let existed = self.live(key).is_some();
        self.entries.remove(key);
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.check_open()?;
        Ok(self.live(key).is_some())
    }

    async fn expire(&self, key: &str, expiration: Duration) -> Result<bool, CacheError> {
        self.check_open()?;
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                entry.expires_at = Some(now + expiration);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Ttl, CacheError> {
        self.check_open()?;
        Ok(match self.live(key) {
            None => Ttl::Missing,
            Some(Entry { expires_at: None, .. }) => Ttl::Persistent,
            Some(Entry {
                expires_at: Some(at), ..
            }) => Ttl::Expires(at.saturating_duration_since(Instant::now())),
        })
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.check_open()
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(sweeper) = self.lock_sweeper().take() {
            sweeper.abort();
        }
        self.entries.clear();
        Ok(())
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.len())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn keys_expire() {
        let cache = MemoryCache::new();
        cache.set("session", "abc", Some(Duration::from_secs(10))).await.unwrap();
        cache.set("config", "xyz", None).await.unwrap();

        assert_eq!(cache.get("session").await.unwrap().as_deref(), Some("abc"));
        assert_eq!(cache.ttl("config").await.unwrap(), Ttl::Persistent);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get("session").await.unwrap(), None);
        assert_eq!(cache.ttl("session").await.unwrap(), Ttl::Missing);
        assert!(cache.exists("config").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn expire_sets_a_deadline_on_live_keys_only() {
        let cache = MemoryCache::new();
        cache.set("a", "1", None).await.unwrap();

        assert!(cache.expire("a", Duration::from_secs(5)).await.unwrap());
        assert!(!cache.expire("missing", Duration::from_secs(5)).await.unwrap());
        assert_eq!(cache.ttl("a").await.unwrap(), Ttl::Expires(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn non_utf8_values_are_reported() {
        let cache = MemoryCache::new();
        cache.set_bytes("raw", vec![0xff, 0xfe], None).await.unwrap();
        assert_eq!(
            cache.get("raw").await.unwrap_err(),
            CacheError::NotUtf8 { key: "raw".to_string() }
        );
        assert_eq!(cache.get_bytes("raw").await.unwrap(), Some(vec![0xff, 0xfe]));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired() {
        let cache = MemoryCache::new();
        cache.set("short", "1", Some(Duration::from_secs(1))).await.unwrap();
        cache.set("long", "2", Some(Duration::from_secs(60))).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn closed_cache_rejects_operations() {
        let cache = MemoryCache::new();
        cache.spawn_sweeper(Duration::from_millis(10));
        cache.close().await.unwrap();
        assert_eq!(cache.ping().await.unwrap_err(), CacheError::Closed);
        assert_eq!(cache.set("k", "v", None).await.unwrap_err(), CacheError::Closed);
    }
}
