//! Byte-budgeted LRU cache of decoded images.
//!
//! Keys are `(identifier, variant)` pairs, values are shared read-only
//! `DecodedImage`s. The total footprint of all entries never exceeds the
//! budget once a call returns: `put` evicts least-recently-used entries first
//! and refuses images that could never fit.
//!
//! Mapping and recency order live in a single `LruCache` behind one mutex, so
//! no caller can observe a key present in one but not the other. Decoding
//! never happens while the lock is held.

use lru::LruCache;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::loader::{CacheKey, DecodedImage};

pub const DEFAULT_CACHE_BUDGET: u64 = 500 * 1024 * 1024;

struct CacheInner {
    entries: LruCache<CacheKey, Arc<DecodedImage>>,
    used_bytes: u64,
}

pub struct ImageCache {
    inner: Mutex<CacheInner>,
    budget: u64,
}

impl ImageCache {
    pub fn new(budget: u64) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::unbounded(),
                used_bytes: 0,
            }),
            budget,
        }
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<DecodedImage>> {
        let mut inner = self.inner.lock();
        let hit = inner.entries.get(key).cloned();
        log::trace!("[cache] {} {}", if hit.is_some() { "hit" } else { "miss" }, key);
        hit
    }

    /// Presence check that leaves recency untouched.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains(key)
    }

    /// Insert or replace `key`.
    ///
    /// Evicts least-recently-used entries until the image fits. An image whose
    /// footprint alone exceeds the budget is rejected: `false` is returned and
    /// any older entry for the same key is dropped, so later lookups miss and
    /// fall through to decoding.
    pub fn put(&self, key: CacheKey, image: Arc<DecodedImage>) -> bool {
        let size = image.footprint();
        let mut inner = self.inner.lock();

        if let Some(old) = inner.entries.pop(&key) {
            inner.used_bytes -= old.footprint();
        }

        if size > self.budget {
            log::debug!(
                "[cache] rejecting {} ({} bytes > budget {})",
                key,
                size,
                self.budget
            );
            return false;
        }

        while inner.used_bytes + size > self.budget {
            match inner.entries.pop_lru() {
                Some((evicted, img)) => {
                    inner.used_bytes -= img.footprint();
                    log::debug!("[cache] evicted {} ({} bytes)", evicted, img.footprint());
                }
                None => break,
            }
        }

        inner.used_bytes += size;
        inner.entries.put(key, image);
        true
    }

    /// Remove every entry whose key matches. Returns how many were removed.
    pub fn invalidate<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&CacheKey) -> bool,
    {
        let mut inner = self.inner.lock();
        let doomed: Vec<CacheKey> = inner
            .entries
            .iter()
            .filter_map(|(k, _)| predicate(k).then(|| k.clone()))
            .collect();
        for key in &doomed {
            if let Some(img) = inner.entries.pop(key) {
                inner.used_bytes -= img.footprint();
            }
        }
        doomed.len()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.used_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn used_bytes(&self) -> u64 {
        self.inner.lock().used_bytes
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Keys from least to most recently used.
    pub fn keys_lru_first(&self) -> Vec<CacheKey> {
        let inner = self.inner.lock();
        inner.entries.iter().rev().map(|(k, _)| k.clone()).collect()
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_BUDGET)
    }
}
