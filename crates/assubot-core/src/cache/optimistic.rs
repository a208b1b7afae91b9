//! Optimistic updates with all-or-nothing rollback.
//!
//! A mutation collects one [`PatchHandle`] per cache entry it touched into a
//! [`PatchSet`] before sending its request. If the request fails the whole set
//! is undone, newest patch first.

use std::future::Future;

use serde_json::Value;

use super::key::CacheKey;
use super::query_cache::QueryCache;

/// Snapshot of a cache entry taken just before it was patched
#[derive(Debug, Clone)]
pub struct PatchHandle {
    key: CacheKey,
    previous: Value,
}

impl PatchHandle {
    pub(crate) fn new(key: CacheKey, previous: Value) -> Self {
        Self { key, previous }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub(crate) fn into_parts(self) -> (CacheKey, Value) {
        (self.key, self.previous)
    }
}

#[must_use = "an uncommitted PatchSet leaves optimistic data in the cache without a way to undo it"]
pub struct PatchSet {
    cache: QueryCache,
    patches: Vec<PatchHandle>,
}

impl PatchSet {
    pub fn new(cache: QueryCache) -> Self {
        Self {
            cache,
            patches: Vec::new(),
        }
    }

    /// Record a patch; `None` (entry absent or unchanged) is ignored
    pub fn push(&mut self, handle: Option<PatchHandle>) {
        if let Some(handle) = handle {
            self.patches.push(handle);
        }
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.patches.iter().map(PatchHandle::key)
    }

    /// Restore every patched entry, newest first
    pub fn undo(self) {
        let count = self.patches.len();
        for handle in self.patches.into_iter().rev() {
            self.cache.restore(handle);
        }
        if count > 0 {
            tracing::debug!(count, "optimistic patches rolled back");
        }
    }

    /// Keep the optimistic state
    pub fn commit(self) {}
}

/// Await `request`; undo `patches` if it fails, keep them if it succeeds
pub async fn run_optimistic<T, E, Fut>(patches: PatchSet, request: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    match request.await {
        Ok(value) => {
            patches.commit();
            Ok(value)
        }
        Err(e) => {
            patches.undo();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn seeded_cache() -> (QueryCache, Vec<CacheKey>) {
        let cache = QueryCache::new(Duration::from_secs(60));
        let keys: Vec<CacheKey> = (0..3)
            .map(|i| CacheKey::raw("getThing", format!("{{\"n\":{}}}", i)))
            .collect();
        for key in &keys {
            cache.insert(key.clone(), json!({"value": 0}), vec![]);
        }
        (cache, keys)
    }

    fn bump_all(cache: &QueryCache, keys: &[CacheKey]) -> PatchSet {
        let mut set = PatchSet::new(cache.clone());
        for key in keys {
            set.push(cache.update_query_data(key, |v| {
                v["value"] = json!(1);
                true
            }));
        }
        set
    }

    #[tokio::test]
    async fn test_failure_restores_every_entry() {
        let (cache, keys) = seeded_cache();
        let set = bump_all(&cache, &keys);
        assert_eq!(set.len(), 3);

        let result: Result<(), &str> = run_optimistic(set, async { Err("boom") }).await;
        assert_eq!(result, Err("boom"));
        for key in &keys {
            assert_eq!(cache.get(key).unwrap(), json!({"value": 0}));
        }
    }

    #[tokio::test]
    async fn test_success_keeps_patches() {
        let (cache, keys) = seeded_cache();
        let set = bump_all(&cache, &keys);

        let result: Result<u8, &str> = run_optimistic(set, async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
        for key in &keys {
            assert_eq!(cache.get(key).unwrap(), json!({"value": 1}));
        }
    }

    #[test]
    fn test_patches_applied_before_request_is_polled() {
        let (cache, keys) = seeded_cache();
        let set = bump_all(&cache, &keys);
        // Request future not yet awaited: the cache already shows the optimistic state
        assert_eq!(cache.get(&keys[0]).unwrap(), json!({"value": 1}));
        set.undo();
        assert_eq!(cache.get(&keys[0]).unwrap(), json!({"value": 0}));
    }
}
