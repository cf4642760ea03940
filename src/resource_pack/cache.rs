//! Expiring single-flight cache keyed by [`AssetKey`].
//!
//! Concurrent lookups for one key share a single in-flight load. Failed loads
//! are dropped so the next lookup retries; a load that resolves to "nothing"
//! (`Ok(None)`) is cached like any other hit.

use super::AssetKey;
use crate::error::{RenderError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

type SharedLoad<V> = Shared<BoxFuture<'static, std::result::Result<Option<V>, Arc<RenderError>>>>;

/// Expiry settings for an [`AssetCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Drop an entry this long after its value was written.
    pub expire_after_write: Duration,
    /// Drop an entry this long after it was last read.
    pub expire_after_access: Duration,
    /// Minimum time between two expiry sweeps.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expire_after_write: Duration::from_secs(10 * 60),
            expire_after_access: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

enum EntryState<V> {
    Loading(SharedLoad<V>),
    Ready(Option<V>),
}

struct CacheEntry<V> {
    state: EntryState<V>,
    written: Instant,
    accessed: Instant,
    generation: u64,
}

struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    last_sweep: Instant,
    next_generation: u64,
}

impl<V> CacheInner<V> {
    fn sweep(&mut self, now: Instant, config: &CacheConfig) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| match entry.state {
            EntryState::Loading(_) => true,
            EntryState::Ready(_) => {
                now.duration_since(entry.written) < config.expire_after_write
                    && now.duration_since(entry.accessed) < config.expire_after_access
            }
        });
        self.last_sweep = now;
        before - self.entries.len()
    }

    fn maybe_sweep(&mut self, now: Instant, config: &CacheConfig) {
        if now.duration_since(self.last_sweep) >= config.sweep_interval {
            self.sweep(now, config);
        }
    }
}

/// A generic expiring cache wrapping an async loader.
pub struct AssetCache<V> {
    name: &'static str,
    config: CacheConfig,
    inner: Mutex<CacheInner<V>>,
}

impl<V> AssetCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, config: CacheConfig) -> Self {
        Self {
            name,
            config,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
                next_generation: 0,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached value for `key`, running `loader` only if no entry
    /// (finished or in flight) exists.
    pub async fn get_or_load<F, Fut>(&self, key: &AssetKey, loader: F) -> Result<Option<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>>> + Send + 'static,
    {
        let cache_key = key.serialize();
        let now = Instant::now();

        let (load, generation) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            inner.maybe_sweep(now, &self.config);

            if let Some(entry) = inner.entries.get_mut(&cache_key) {
                entry.accessed = now;
                match &entry.state {
                    EntryState::Ready(value) => return Ok(value.clone()),
                    EntryState::Loading(load) => (load.clone(), entry.generation),
                }
            } else {
                log::debug!("{} cache miss: {}", self.name, key);
                let generation = inner.next_generation;
                inner.next_generation += 1;
                let load: SharedLoad<V> = loader().map(|result| result.map_err(Arc::new)).boxed().shared();
                inner.entries.insert(
                    cache_key.clone(),
                    CacheEntry {
                        state: EntryState::Loading(load.clone()),
                        written: now,
                        accessed: now,
                        generation,
                    },
                );
                (load, generation)
            }
        };

        let result = load.await;

        let mut inner = self.inner.lock();
        let same_load = inner
            .entries
            .get(&cache_key)
            .map(|entry| entry.generation == generation && matches!(entry.state, EntryState::Loading(_)))
            .unwrap_or(false);
        if same_load {
            match &result {
                Ok(value) => {
                    if let Some(entry) = inner.entries.get_mut(&cache_key) {
                        let done = Instant::now();
                        entry.state = EntryState::Ready(value.clone());
                        entry.written = done;
                        entry.accessed = done;
                    }
                }
                Err(err) => {
                    log::debug!("{} cache dropping failed load for {}: {}", self.name, key, err);
                    inner.entries.remove(&cache_key);
                }
            }
        }

        result.map_err(RenderError::from)
    }

    /// Return a finished entry without loading.
    pub fn get_if_present(&self, key: &AssetKey) -> Option<Option<V>> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.maybe_sweep(now, &self.config);
        let entry = inner.entries.get_mut(&key.serialize())?;
        entry.accessed = now;
        match &entry.state {
            EntryState::Ready(value) => Some(value.clone()),
            EntryState::Loading(_) => None,
        }
    }

    /// Store a value directly, replacing any entry for `key`.
    pub fn put(&self, key: &AssetKey, value: Option<V>) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let generation = inner.next_generation;
        inner.next_generation += 1;
        inner.entries.insert(
            key.serialize(),
            CacheEntry {
                state: EntryState::Ready(value),
                written: now,
                accessed: now,
                generation,
            },
        );
    }

    pub fn invalidate(&self, key: &AssetKey) {
        self.inner.lock().entries.remove(&key.serialize());
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep expired entries now, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let removed = self.inner.lock().sweep(now, &self.config);
        if removed > 0 {
            log::debug!("{} cache expired {} entries", self.name, removed);
        }
        removed
    }
}
