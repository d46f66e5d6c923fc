//! Single-flight, byte-budgeted scenario cache.
//!
//! Re-sampling per lineup would dominate request latency; the per-lineup
//! algorithm therefore fetches its matrix from this cache, and the cache
//! guarantees that concurrent misses on the same key produce exactly one
//! `ScenarioSource::sample` call. Readers are lock-free after publication
//! (they hold an `Arc` to the immutable matrix); population and eviction are
//! serialized on the store mutex, with the sampling itself done outside it
//! inside a per-entry `OnceCell`.

use once_cell::sync::OnceCell;
use slipstream_core::{CancelToken, SlipResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::matrix::ScenarioMatrix;
use crate::source::ScenarioSource;

/// Lookup key: matrices are reusable only when the slate, the scenario
/// count, and the sampling fingerprint (seed or constraint-spec hash) all
/// match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub slate_id: String,
    pub n_scenarios: usize,
    /// Seed, or a hash of the constraint spec for calibrated sources.
    pub fingerprint: u64,
}

impl CacheKey {
    pub fn new(slate_id: impl Into<String>, n_scenarios: usize, fingerprint: u64) -> Self {
        Self {
            slate_id: slate_id.into(),
            n_scenarios,
            fingerprint,
        }
    }
}

/// Cache tuning. The byte budget bounds resident matrices; entries older
/// than the TTL are dropped on the next store access.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_bytes: usize,
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            // A 10k x 50 matrix is ~4 MB; keep room for a handful of slates.
            max_bytes: 256 * 1024 * 1024,
            ttl: Some(Duration::from_secs(60 * 60)),
        }
    }
}

struct Entry {
    cell: Arc<OnceCell<Arc<ScenarioMatrix>>>,
    created_at: Instant,
    last_used: Instant,
}

/// Shared scenario-matrix store. Owned by the request dispatcher and handed
/// to generators by reference; nothing here relies on global state.
pub struct ScenarioCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    config: CacheConfig,
}

impl ScenarioCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Fetch the matrix for `key`, sampling it through `source` on a miss.
    ///
    /// Single-flight: the first caller for a key runs the sample inside the
    /// entry's `OnceCell`; concurrent callers for the same key block on that
    /// cell rather than sampling again. The cancel token is honored before
    /// sampling starts, so a cancelled request does not spawn orphan work.
    pub fn get_or_sample(
        &self,
        key: &CacheKey,
        source: &dyn ScenarioSource,
        token: &CancelToken,
    ) -> SlipResult<Arc<ScenarioMatrix>> {
        let cell = {
            let mut entries = self.entries.lock().expect("scenario cache poisoned");
            self.purge_expired(&mut entries);
            let now = Instant::now();
            let entry = entries.entry(key.clone()).or_insert_with(|| Entry {
                cell: Arc::new(OnceCell::new()),
                created_at: now,
                last_used: now,
            });
            entry.last_used = now;
            Arc::clone(&entry.cell)
        };

        let hit = cell.get().is_some();
        let matrix = cell
            .get_or_try_init(|| {
                token.check("scenario cache population")?;
                debug!(
                    slate = %key.slate_id,
                    n_scenarios = key.n_scenarios,
                    "scenario cache miss; sampling"
                );
                source
                    .sample(key.n_scenarios, key.fingerprint)
                    .map(Arc::new)
            })?
            .clone();

        if !hit {
            let mut entries = self.entries.lock().expect("scenario cache poisoned");
            self.evict_over_budget(&mut entries, key);
        }
        Ok(matrix)
    }

    /// Resident bytes across initialized entries.
    pub fn resident_bytes(&self) -> usize {
        let entries = self.entries.lock().expect("scenario cache poisoned");
        entries
            .values()
            .filter_map(|e| e.cell.get())
            .map(|m| m.approx_bytes())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("scenario cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(&self, entries: &mut HashMap<CacheKey, Entry>) {
        if let Some(ttl) = self.config.ttl {
            let now = Instant::now();
            // In-flight entries (uninitialized cells) are pinned.
            entries.retain(|_, e| e.cell.get().is_none() || now.duration_since(e.created_at) < ttl);
        }
    }

    /// LRU eviction down to the byte budget. The entry just used and any
    /// in-flight entries are pinned.
    fn evict_over_budget(&self, entries: &mut HashMap<CacheKey, Entry>, pinned: &CacheKey) {
        loop {
            let resident: usize = entries
                .values()
                .filter_map(|e| e.cell.get())
                .map(|m| m.approx_bytes())
                .sum();
            if resident <= self.config.max_bytes {
                return;
            }
            let victim: Option<CacheKey> = entries
                .iter()
                .filter(|(k, e)| **k != *pinned && e.cell.get().is_some())
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| (*k).clone());
            match victim {
                Some(k) => {
                    debug!(slate = %k.slate_id, "evicting scenario matrix (LRU)");
                    entries.remove(&k);
                }
                None => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipstream_core::SlipstreamError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that counts sample calls and produces a constant matrix.
    struct CountingSource {
        calls: AtomicUsize,
        n_drivers: usize,
    }

    impl CountingSource {
        fn new(n_drivers: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                n_drivers,
            }
        }
    }

    impl ScenarioSource for CountingSource {
        fn sample(&self, n_scenarios: usize, seed: u64) -> SlipResult<ScenarioMatrix> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let data = vec![seed as f64; n_scenarios * self.n_drivers];
            ScenarioMatrix::from_rows(data, n_scenarios, self.n_drivers)
        }

        fn n_drivers(&self) -> usize {
            self.n_drivers
        }
    }

    #[test]
    fn second_lookup_hits_cache() {
        let cache = ScenarioCache::with_defaults();
        let source = CountingSource::new(4);
        let key = CacheKey::new("slate", 100, 42);
        let token = CancelToken::new();
        let a = cache.get_or_sample(&key, &source, &token).unwrap();
        let b = cache.get_or_sample(&key, &source, &token).unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_keys_sample_separately() {
        let cache = ScenarioCache::with_defaults();
        let source = CountingSource::new(4);
        let token = CancelToken::new();
        cache
            .get_or_sample(&CacheKey::new("slate", 100, 1), &source, &token)
            .unwrap();
        cache
            .get_or_sample(&CacheKey::new("slate", 100, 2), &source, &token)
            .unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cancelled_token_skips_sampling() {
        let cache = ScenarioCache::with_defaults();
        let source = CountingSource::new(4);
        let token = CancelToken::new();
        token.cancel();
        let err = cache
            .get_or_sample(&CacheKey::new("slate", 100, 1), &source, &token)
            .unwrap_err();
        assert!(matches!(err, SlipstreamError::Cancelled(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn lru_eviction_respects_budget() {
        // Budget fits one 100 x 4 matrix but not two.
        let one_matrix = (100 * 4 + 4) * std::mem::size_of::<f64>();
        let cache = ScenarioCache::new(CacheConfig {
            max_bytes: one_matrix + 16,
            ttl: None,
        });
        let source = CountingSource::new(4);
        let token = CancelToken::new();
        cache
            .get_or_sample(&CacheKey::new("a", 100, 1), &source, &token)
            .unwrap();
        cache
            .get_or_sample(&CacheKey::new("b", 100, 1), &source, &token)
            .unwrap();
        assert_eq!(cache.len(), 1, "older entry should be evicted");
        // Re-fetching the evicted key samples again.
        cache
            .get_or_sample(&CacheKey::new("a", 100, 1), &source, &token)
            .unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn concurrent_misses_single_flight() {
        let cache = Arc::new(ScenarioCache::with_defaults());
        let source = Arc::new(CountingSource::new(4));
        let key = CacheKey::new("slate", 500, 9);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let source = Arc::clone(&source);
            let key = key.clone();
            handles.push(std::thread::spawn(move || {
                let token = CancelToken::new();
                cache.get_or_sample(&key, source.as_ref(), &token).unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
