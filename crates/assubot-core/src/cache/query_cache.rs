use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;

use super::key::{CacheKey, Tag};
use super::optimistic::PatchHandle;

struct CacheEntry {
    data: Value,
    tags: Vec<Tag>,
    stale: bool,
    fetched_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Subscriber refcounts; may exist before the entry is first fetched
    subscribers: HashMap<CacheKey, usize>,
    /// When the last subscriber of a key went away (or the entry was stored unobserved)
    unused_since: HashMap<CacheKey, Instant>,
}

impl CacheState {
    fn subscriber_count(&self, key: &CacheKey) -> usize {
        self.subscribers.get(key).copied().unwrap_or(0)
    }
}

/// Query result cache keyed by `(endpoint, serialized args)`.
///
/// Holds raw JSON so unknown backend fields survive optimistic patches.
/// Clones share the same cache.
#[derive(Clone)]
pub struct QueryCache {
    state: Arc<RwLock<CacheState>>,
    keep_unused: Duration,
}

impl QueryCache {
    pub fn new(keep_unused: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(CacheState::default())),
            keep_unused,
        }
    }

    pub fn insert(&self, key: CacheKey, data: Value, tags: Vec<Tag>) {
        let now = Instant::now();
        let mut state = self.state.write();
        if state.subscriber_count(&key) == 0 {
            state.unused_since.entry(key.clone()).or_insert(now);
        }
        tracing::trace!(key = %key, "cache insert");
        state.entries.insert(
            key,
            CacheEntry {
                data,
                tags,
                stale: false,
                fetched_at: now,
            },
        );
    }

    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        self.state.read().entries.get(key).map(|e| e.data.clone())
    }

    /// Cached value decoded as `T`, only when present and not invalidated
    pub fn fresh<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let state = self.state.read();
        let entry = state.entries.get(key).filter(|e| !e.stale)?;
        serde_json::from_value(entry.data.clone()).ok()
    }

    pub fn is_stale(&self, key: &CacheKey) -> Option<bool> {
        self.state.read().entries.get(key).map(|e| e.stale)
    }

    pub fn fetched_at(&self, key: &CacheKey) -> Option<Instant> {
        self.state.read().entries.get(key).map(|e| e.fetched_at)
    }

    pub fn remove(&self, key: &CacheKey) -> Option<Value> {
        let mut state = self.state.write();
        state.unused_since.remove(key);
        state.entries.remove(key).map(|e| e.data)
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.unused_since.clear();
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys_for_endpoint(&self, endpoint: &str) -> Vec<CacheKey> {
        self.state
            .read()
            .entries
            .keys()
            .filter(|k| k.endpoint() == endpoint)
            .cloned()
            .collect()
    }

    /// Keys of `endpoint` whose args parse as `A`, paired with those args.
    /// Entries with unparseable args are skipped.
    pub fn keys_with_args<A: DeserializeOwned>(&self, endpoint: &str) -> Vec<(CacheKey, A)> {
        self.keys_for_endpoint(endpoint)
            .into_iter()
            .filter_map(|key| match key.args::<A>() {
                Some(args) => Some((key, args)),
                None => {
                    tracing::debug!(key = %key, "skipping cache entry with unparseable args");
                    None
                }
            })
            .collect()
    }

    /// Mutate a cached value in place.
    ///
    /// `patch` returns whether it changed anything. A handle restoring the
    /// previous value is returned only when the entry exists and was changed.
    pub fn update_query_data<F>(&self, key: &CacheKey, patch: F) -> Option<PatchHandle>
    where
        F: FnOnce(&mut Value) -> bool,
    {
        let mut state = self.state.write();
        let entry = state.entries.get_mut(key)?;
        let previous = entry.data.clone();
        if !patch(&mut entry.data) {
            return None;
        }
        tracing::trace!(key = %key, "cache patched");
        Some(PatchHandle::new(key.clone(), previous))
    }

    /// Put back a value captured by [`update_query_data`](Self::update_query_data).
    /// A no-op when the entry was removed in the meantime.
    pub fn restore(&self, handle: PatchHandle) {
        let (key, previous) = handle.into_parts();
        let mut state = self.state.write();
        if let Some(entry) = state.entries.get_mut(&key) {
            entry.data = previous;
            tracing::trace!(key = %key, "cache patch undone");
        }
    }

    /// Mark every entry providing one of `tags` as stale. Returns the keys
    /// that now need a refetch.
    pub fn invalidate_tags(&self, tags: &[Tag]) -> Vec<CacheKey> {
        let mut state = self.state.write();
        let mut invalidated = Vec::new();
        for (key, entry) in state.entries.iter_mut() {
            if entry.tags.iter().any(|t| tags.contains(t)) {
                entry.stale = true;
                invalidated.push(key.clone());
            }
        }
        if !invalidated.is_empty() {
            tracing::debug!(count = invalidated.len(), "cache entries invalidated");
        }
        invalidated
    }

    /// Register interest in a key. The entry is kept while any subscription lives.
    pub fn subscribe(&self, key: CacheKey) -> QuerySubscription {
        let mut state = self.state.write();
        *state.subscribers.entry(key.clone()).or_insert(0) += 1;
        state.unused_since.remove(&key);
        QuerySubscription {
            key,
            cache: self.clone(),
        }
    }

    pub fn subscriber_count(&self, key: &CacheKey) -> usize {
        self.state.read().subscriber_count(key)
    }

    fn release(&self, key: &CacheKey) {
        let mut state = self.state.write();
        let remaining = match state.subscribers.get_mut(key) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => return,
        };
        if remaining == 0 {
            state.subscribers.remove(key);
            if state.entries.contains_key(key) {
                state.unused_since.insert(key.clone(), Instant::now());
            }
        }
    }

    /// Drop entries that have had no subscriber for longer than the keep-unused window
    pub fn evict_unused(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.write();
        let expired: Vec<CacheKey> = state
            .unused_since
            .iter()
            .filter(|(_, since)| now.duration_since(**since) >= self.keep_unused)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            state.unused_since.remove(key);
            state.entries.remove(key);
        }
        expired.len()
    }
}

/// Keeps a cached query alive; releases its refcount on drop
pub struct QuerySubscription {
    key: CacheKey,
    cache: QueryCache,
}

impl QuerySubscription {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Drop for QuerySubscription {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}
