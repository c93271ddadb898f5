//! Content-addressed horizon-metrics cache.
//!
//! Entries are keyed by a BLAKE3 digest of the exact input bytes, so identical
//! inputs always map to the same entry and any change to positions, returns,
//! the horizon set or the sample threshold produces a new key. The cache is
//! striped across independently locked LRU shards so concurrent workers rarely
//! contend on the same lock.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::HorizonMetricsMap;
use crate::config::ConfigError;

/// 32-byte BLAKE3 digest of one analysis input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    fn shard(&self, shards: usize) -> usize {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[..8]);
        (u64::from_le_bytes(buf) % shards as u64) as usize
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct HorizonCache {
    shards: Vec<Mutex<LruCache<CacheKey, HorizonMetricsMap>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for HorizonCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HorizonCache")
            .field("shards", &self.shards.len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl HorizonCache {
    /// Total `capacity` entries spread over `shards` locks (each shard holds at
    /// least one entry).
    pub fn new(capacity: usize, shards: usize) -> Result<Self, ConfigError> {
        if capacity == 0 || shards == 0 {
            return Err(ConfigError::InvalidCacheSize);
        }
        let per_shard = NonZeroUsize::new(capacity.div_ceil(shards)).ok_or(ConfigError::InvalidCacheSize)?;
        let shards = (0..shards)
            .map(|_| Mutex::new(LruCache::new(per_shard)))
            .collect();
        Ok(Self {
            shards,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Digest of `(positions, returns, horizons, min_sample_size)`.
    ///
    /// `horizons` should already be sorted and deduplicated.
    pub fn key(positions: &[f64], returns: &[f64], horizons: &[usize], min_sample_size: usize) -> CacheKey {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(positions.len() as u64).to_le_bytes());
        for v in positions {
            hasher.update(&v.to_le_bytes());
        }
        hasher.update(&(returns.len() as u64).to_le_bytes());
        for v in returns {
            hasher.update(&v.to_le_bytes());
        }
        hasher.update(&(horizons.len() as u64).to_le_bytes());
        for h in horizons {
            hasher.update(&(*h as u64).to_le_bytes());
        }
        hasher.update(&(min_sample_size as u64).to_le_bytes());
        CacheKey(*hasher.finalize().as_bytes())
    }

    pub fn get(&self, key: &CacheKey) -> Option<HorizonMetricsMap> {
        let found = self.shards[key.shard(self.shards.len())]
            .lock()
            .ok()
            .and_then(|mut shard| shard.get(key).cloned());
        match found {
            Some(hit) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key.to_hex(), "horizon cache hit");
                Some(hit)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert an entry. A poisoned shard silently drops the write.
    pub fn insert(&self, key: CacheKey, metrics: HorizonMetricsMap) {
        if let Ok(mut shard) = self.shards[key.shard(self.shards.len())].lock() {
            shard.put(key, metrics);
        }
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .filter_map(|s| s.lock().ok().map(|s| s.len()))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            if let Ok(mut s) = shard.lock() {
                s.clear();
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
