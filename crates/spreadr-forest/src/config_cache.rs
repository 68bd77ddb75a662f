//! TTL cache for the experiment configuration.
//!
//! Shape targets tolerate minutes of staleness, so configuration reads go
//! through this cache instead of hitting the database on every request.
//! Updates invalidate it explicitly. Lease fields never pass through here —
//! they are read inside the store's transactions.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use spreadr_core::Configuration;

use crate::errors::{ForestError, Result};

struct CachedEntry {
    fetched_at: Instant,
    value: Configuration,
}

/// Explicit, injectable TTL cache over the configuration repository.
pub struct ConfigCache {
    ttl: Duration,
    slot: Mutex<Option<CachedEntry>>,
}

impl ConfigCache {
    /// Create a cache with the given TTL. A zero TTL disables caching.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached configuration, or run `fetch` and cache its result.
    pub fn get_or_fetch(
        &self,
        fetch: impl FnOnce() -> Result<Configuration>,
    ) -> Result<Configuration> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| ForestError::Internal("config cache lock poisoned".into()))?;

        if let Some(entry) = slot.as_ref() {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.value.clone());
            }
        }

        let value = fetch()?;
        *slot = Some(CachedEntry {
            fetched_at: Instant::now(),
            value: value.clone(),
        });
        Ok(value)
    }

    /// Drop the cached value so the next read refetches.
    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counted_fetch(counter: &AtomicU32) -> impl FnOnce() -> Result<Configuration> + '_ {
        move || {
            let _ = counter.fetch_add(1, Ordering::SeqCst);
            Ok(Configuration::default())
        }
    }

    #[test]
    fn second_read_within_ttl_hits_cache() {
        let cache = ConfigCache::new(Duration::from_secs(60));
        let fetches = AtomicU32::new(0);

        let _ = cache.get_or_fetch(counted_fetch(&fetches)).unwrap();
        let _ = cache.get_or_fetch(counted_fetch(&fetches)).unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_ttl_always_fetches() {
        let cache = ConfigCache::new(Duration::ZERO);
        let fetches = AtomicU32::new(0);

        let _ = cache.get_or_fetch(counted_fetch(&fetches)).unwrap();
        let _ = cache.get_or_fetch(counted_fetch(&fetches)).unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn expired_entry_refetches() {
        let cache = ConfigCache::new(Duration::from_millis(20));
        let fetches = AtomicU32::new(0);

        let _ = cache.get_or_fetch(counted_fetch(&fetches)).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        let _ = cache.get_or_fetch(counted_fetch(&fetches)).unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalidate_forces_refetch() {
        let cache = ConfigCache::new(Duration::from_secs(60));
        let fetches = AtomicU32::new(0);

        let _ = cache.get_or_fetch(counted_fetch(&fetches)).unwrap();
        cache.invalidate();
        let _ = cache.get_or_fetch(counted_fetch(&fetches)).unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fetch_errors_are_not_cached() {
        let cache = ConfigCache::new(Duration::from_secs(60));
        let err = cache
            .get_or_fetch(|| Err(ForestError::Internal("db down".into())))
            .unwrap_err();
        assert!(matches!(err, ForestError::Internal(_)));

        let fetches = AtomicU32::new(0);
        let _ = cache.get_or_fetch(counted_fetch(&fetches)).unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }
}
