//  Copyright 2026 The concache Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

//! The cache facade (component C5): ties the ordered map (C1), the size
//! accountant (C2), the eviction sweep (C3) and the creation registry (C4)
//! together behind the two-lock discipline in [`CacheConfig`]'s doc comment.

use std::future::Future;
use std::sync::Arc;

use ahash::RandomState;
use concache_common::{ConfigError, Key, Value};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::accountant::SizeAccountant;
use crate::chain::OrderedMap;
use crate::creation::{Cause, CreationRegistry, Outcome};
use crate::eviction::Strategy;
use crate::listener::{NoopListener, RemovalListener};

/// A `size_of` function: must be non-negative and, for a given `(k, v)`,
/// must always return the same value — the accountant trusts it blindly.
pub type SizeOf<K, V> = Arc<dyn Fn(&K, &V) -> i64 + Send + Sync>;

/// Plain configuration struct, set by direct field assignment rather than
/// a builder — mirroring the teacher's `GenericCacheConfig`.
pub struct CacheConfig<K, V, L = NoopListener>
where
    K: Key,
    V: Value,
{
    /// Total budget `size_of` sums to; must be strictly positive.
    pub max_size: i64,
    /// Which of the four eviction policies governs this cache.
    pub strategy: Strategy,
    /// Runs every producer future passed to `put_with`/`get_or_put`/`put_async`.
    pub executor: tokio::runtime::Handle,
    /// Size function charged against `max_size`. Defaults to a constant `1`
    /// per entry (count-bounded caching) if left unset.
    pub size_of: SizeOf<K, V>,
    /// Observes every removal and replacement. Defaults to a no-op.
    pub listener: L,
}

impl<K, V> CacheConfig<K, V, NoopListener>
where
    K: Key,
    V: Value,
{
    /// A minimal config: count-bounded, LRU, no-op listener, the calling
    /// task's runtime as executor. Call this from within a Tokio runtime;
    /// override fields directly afterward.
    pub fn new(max_size: i64) -> Self {
        Self {
            max_size,
            strategy: Strategy::default(),
            executor: tokio::runtime::Handle::current(),
            size_of: Arc::new(|_, _| 1),
            listener: NoopListener,
        }
    }
}

struct MapState<K, V> {
    chain: OrderedMap<K, Arc<V>, RandomState>,
    accountant: SizeAccountant,
    max_size: i64,
}

struct Inner<K, V, L>
where
    K: Key,
    V: Value,
{
    map_lock: Mutex<MapState<K, V>>,
    creation_lock: Mutex<CreationRegistry<K, Arc<V>, RandomState>>,
    strategy: Strategy,
    size_of: SizeOf<K, V>,
    listener: L,
    executor: tokio::runtime::Handle,
}

/// A concurrency-safe, size-bounded associative cache with pluggable
/// eviction and coalesced asynchronous value production.
///
/// Two locks guard disjoint state and are always acquired in the order
/// `creationLock` → `mapLock`, never the reverse, and never held across an
/// `.await`. Replacement and eviction both invoke the [`RemovalListener`],
/// but at different times: evictions fire synchronously while `mapLock` is
/// held; replacements from `put`/`put_all`/`remove` fire after it is
/// released.
pub struct Cache<K, V, L = NoopListener>
where
    K: Key,
    V: Value,
    L: RemovalListener<K, V>,
{
    inner: Arc<Inner<K, V, L>>,
}

impl<K, V, L> Clone for Cache<K, V, L>
where
    K: Key,
    V: Value,
    L: RemovalListener<K, V>,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// A handle to an asynchronously running producer, returned by
/// [`Cache::put_async`]. Dropping it without calling [`ProducerHandle::join`]
/// does not cancel the producer — it keeps running and still commits.
pub struct ProducerHandle<K, V, L>
where
    K: Key,
    V: Value,
    L: RemovalListener<K, V>,
{
    cache: Cache<K, V, L>,
    key: K,
    outcome_rx: watch::Receiver<Outcome<Arc<V>>>,
}

impl<K, V, L> ProducerHandle<K, V, L>
where
    K: Key,
    V: Value,
    L: RemovalListener<K, V>,
{
    /// Awaits the producer's outcome, following replacement chains exactly
    /// as a concurrent `get` would.
    pub async fn join(self) -> Option<Arc<V>> {
        self.cache.await_outcome(self.key, self.outcome_rx).await
    }
}

impl<K, V, L> Cache<K, V, L>
where
    K: Key,
    V: Value,
    L: RemovalListener<K, V>,
{
    /// Builds a cache from `config`. Fails only if `max_size <= 0`.
    pub fn new(config: CacheConfig<K, V, L>) -> Result<Self, ConfigError> {
        if config.max_size <= 0 {
            return Err(ConfigError::NonPositiveMaxSize);
        }
        let chain_mode = config.strategy.chain_mode();
        let inner = Inner {
            map_lock: Mutex::new(MapState {
                chain: OrderedMap::new(chain_mode),
                accountant: SizeAccountant::default(),
                max_size: config.max_size,
            }),
            creation_lock: Mutex::new(CreationRegistry::new()),
            strategy: config.strategy,
            size_of: config.size_of,
            listener: config.listener,
            executor: config.executor,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// The configured eviction policy.
    pub fn strategy(&self) -> Strategy {
        self.inner.strategy
    }

    /// Current number of committed entries (excludes in-flight producers).
    pub fn len(&self) -> usize {
        self.inner.map_lock.lock().chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of `size_of` over every committed entry.
    pub fn size(&self) -> i64 {
        self.inner.map_lock.lock().accountant.total()
    }

    /// Returns the committed value for `key` without waiting on any
    /// in-flight producer.
    pub fn get_if_available(&self, key: &K) -> Option<Arc<V>> {
        let mut map = self.inner.map_lock.lock();
        map.chain.get(key).cloned()
    }

    /// Returns the committed value for `key`, or the outcome of the
    /// in-flight producer for it, if any. Never starts a producer itself.
    pub async fn get(&self, key: &K) -> Option<Arc<V>> {
        let joined = {
            let creation = self.inner.creation_lock.lock();
            creation.join(key)
        };
        match joined {
            Some(rx) => self.await_outcome(key.clone(), rx).await,
            None => self.get_if_available(key),
        }
    }

    /// Like [`Cache::get`], but returns `default` wrapped in an `Arc`
    /// instead of `None`.
    pub async fn get_or_default(&self, key: &K, default: V) -> Arc<V> {
        match self.get(key).await {
            Some(v) => v,
            None => Arc::new(default),
        }
    }

    /// Commits `value` for `key` immediately, cancelling any in-flight
    /// producer (with [`Cause::Value`]) and running the eviction sweep
    /// synchronously under `mapLock`. Returns the value it replaced, if any.
    pub fn put(&self, key: K, value: V) -> Option<Arc<V>> {
        self.inner.creation_lock.lock().cancel(&key, Cause::Value);
        let value = Arc::new(value);
        let old = {
            let mut map = self.inner.map_lock.lock();
            self.commit_locked(&mut map, key.clone(), Arc::clone(&value))
        };
        if let Some(ref old_value) = old {
            self.inner
                .listener
                .on_removed(false, &key, old_value, Some(&value));
        }
        old
    }

    /// Commits every `(key, value)` pair atomically with respect to
    /// readers: they observe either none or all of the batch. Returns the
    /// `(key, old_value, new_value)` triples for every entry that replaced
    /// an existing one.
    pub fn put_all(&self, entries: Vec<(K, V)>) -> Vec<(K, Arc<V>, Arc<V>)> {
        let prepared: Vec<(K, Arc<V>)> = entries.into_iter().map(|(k, v)| (k, Arc::new(v))).collect();
        {
            let mut creation = self.inner.creation_lock.lock();
            for (k, _) in &prepared {
                creation.cancel(k, Cause::Value);
            }
        }
        let mut replaced = Vec::new();
        {
            let mut map = self.inner.map_lock.lock();
            for (k, v) in prepared {
                if let Some(old) = self.commit_locked(&mut map, k.clone(), Arc::clone(&v)) {
                    replaced.push((k, old, v));
                }
            }
        }
        for (k, old, new) in &replaced {
            self.inner.listener.on_removed(false, k, old, Some(new));
        }
        replaced
    }

    /// Runs `producer` unconditionally: any existing value or in-flight
    /// producer for `key` is superseded, and this call awaits the new
    /// producer's outcome before returning.
    pub async fn put_with<F, Fut>(&self, key: K, producer: F) -> Option<Arc<V>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Option<V>> + Send + 'static,
    {
        let (outcome_rx, key2) = self.start_producer(key, producer);
        self.await_outcome(key2, outcome_rx).await
    }

    /// Like [`Cache::put_with`], but returns immediately with a handle
    /// instead of awaiting the outcome.
    pub fn put_async<F, Fut>(&self, key: K, producer: F) -> ProducerHandle<K, V, L>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Option<V>> + Send + 'static,
    {
        let (outcome_rx, key2) = self.start_producer(key, producer);
        ProducerHandle {
            cache: self.clone(),
            key: key2,
            outcome_rx,
        }
    }

    /// Returns the value for `key` if committed or already in flight;
    /// otherwise starts `producer` and awaits it. Never runs `producer`
    /// when a value or a producer already exists for `key`.
    pub async fn get_or_put<F, Fut>(&self, key: K, producer: F) -> Option<Arc<V>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Option<V>> + Send + 'static,
    {
        if let Some(v) = self.get(&key).await {
            return Some(v);
        }
        {
            let mut creation = self.inner.creation_lock.lock();
            if !creation.is_in_flight(&key) {
                let exists = self.inner.map_lock.lock().chain.contains_key(&key);
                if !exists {
                    self.spawn_producer(&mut creation, key.clone(), producer);
                }
            }
        }
        self.get(&key).await
    }

    /// Removes `key` if present, cancelling any in-flight producer for it
    /// with [`Cause::Value`] so awaiters fall through to the (now absent)
    /// committed value. Returns the removed value, if any.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.inner.creation_lock.lock().cancel(key, Cause::Value);
        let old = {
            let mut map = self.inner.map_lock.lock();
            map.chain.remove(key).map(|(v, size)| {
                map.accountant.remove(size);
                v
            })
        };
        if let Some(ref v) = old {
            self.inner.listener.on_removed(false, key, v, None);
        }
        old
    }

    /// Cancels every in-flight producer with [`Cause::Value`], without
    /// touching any already-committed value.
    pub fn remove_all_under_creation(&self) {
        self.inner.creation_lock.lock().cancel_all(Cause::Value);
    }

    /// Cancels every in-flight producer, then removes every committed
    /// entry. The listener sees each removal as a plain removal
    /// (`evicted = false`), not an eviction.
    pub fn clear(&self) {
        self.remove_all_under_creation();
        let mut map = self.inner.map_lock.lock();
        let drained = map.chain.drain(self.inner.strategy.forward_end());
        for (k, v, size) in drained {
            map.accountant.remove(size);
            self.inner.listener.on_removed(false, &k, &v, None);
        }
        map.accountant.assert_consistent(map.chain.is_empty());
    }

    /// Cancels every in-flight producer, then evicts every committed entry
    /// via the configured policy, invoking the listener with
    /// `evicted = true` for each.
    pub fn evict_all(&self) {
        self.remove_all_under_creation();
        let mut map = self.inner.map_lock.lock();
        let drained = map.chain.drain(self.inner.strategy.eviction_end());
        for (k, v, size) in drained {
            map.accountant.remove(size);
            self.inner.listener.on_removed(true, &k, &v, None);
        }
        map.accountant.assert_consistent(map.chain.is_empty());
    }

    /// Changes the size budget, immediately evicting down to it if the new
    /// budget is smaller than the current total.
    pub fn resize(&self, new_max_size: i64) -> Result<(), ConfigError> {
        if new_max_size <= 0 {
            return Err(ConfigError::NonPositiveMaxSize);
        }
        let mut map = self.inner.map_lock.lock();
        map.max_size = new_max_size;
        self.trim_to_locked(&mut map, new_max_size);
        Ok(())
    }

    /// Evicts down to `budget`, regardless of the configured `max_size`.
    /// A one-shot trim; does not change `max_size` itself.
    pub fn trim_to_size(&self, budget: i64) {
        let mut map = self.inner.map_lock.lock();
        self.trim_to_locked(&mut map, budget);
    }

    /// Snapshot of committed keys, enumerated from the end least at risk
    /// of eviction toward the end most at risk.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        let map = self.inner.map_lock.lock();
        map.chain.keys_from(self.inner.strategy.forward_end())
    }

    /// Snapshot of keys with a producer currently in flight.
    pub fn under_creation_keys(&self) -> Vec<K> {
        // Both locks are held for this snapshot, creationLock first, even
        // though only the creation registry is read: taking mapLock too
        // gives callers a consistent point-in-time view relative to `keys`
        // and `all_keys`, at the cost of briefly blocking commits.
        let creation = self.inner.creation_lock.lock();
        let _map = self.inner.map_lock.lock();
        creation.keys()
    }

    /// The union of [`Cache::keys`] and [`Cache::under_creation_keys`],
    /// taken as a single consistent snapshot.
    pub fn all_keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        let creation = self.inner.creation_lock.lock();
        let map = self.inner.map_lock.lock();
        let mut out = map.chain.keys_from(self.inner.strategy.forward_end());
        out.extend(creation.keys());
        out
    }

    fn commit_locked(&self, map: &mut MapState<K, V>, key: K, value: Arc<V>) -> Option<Arc<V>> {
        let size = (self.inner.size_of)(&key, &value);
        let prev = map.chain.put(key, value, size);
        let old = match prev {
            Some((old_value, old_size)) => {
                map.accountant.replace(old_size, size);
                Some(old_value)
            }
            None => {
                map.accountant.insert(size);
                None
            }
        };
        let budget = map.max_size;
        self.trim_to_locked(map, budget);
        old
    }

    fn trim_to_locked(&self, map: &mut MapState<K, V>, budget: i64) {
        let end = self.inner.strategy.eviction_end();
        while map.accountant.total() > budget {
            let Some((k, v, size)) = map.chain.pop(end) else {
                break;
            };
            map.accountant.remove(size);
            trace!(?end, "evicting entry to satisfy size budget");
            self.inner.listener.on_removed(true, &k, &v, None);
        }
    }

    fn start_producer<F, Fut>(
        &self,
        key: K,
        producer: F,
    ) -> (watch::Receiver<Outcome<Arc<V>>>, K)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Option<V>> + Send + 'static,
    {
        let mut creation = self.inner.creation_lock.lock();
        let outcome_rx = self.spawn_producer(&mut creation, key.clone(), producer);
        (outcome_rx, key)
    }

    fn spawn_producer<F, Fut>(
        &self,
        creation: &mut CreationRegistry<K, Arc<V>, RandomState>,
        key: K,
        producer: F,
    ) -> watch::Receiver<Outcome<Arc<V>>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Option<V>> + Send + 'static,
    {
        let registration = creation.register(key.clone());
        let outcome_rx = registration.outcome_rx.clone();
        let cache = self.clone();
        let mut cancel_rx = registration.cancel_rx;
        let outcome_tx = registration.outcome_tx;
        let id = registration.id;
        let task_key = key.clone();

        self.inner.executor.spawn(async move {
            let mut producer_task = tokio::spawn(producer());
            debug!("producer started");
            let outcome = tokio::select! {
                biased;
                _ = cancel_rx.changed() => {
                    let cause = cancel_rx.borrow_and_update().unwrap_or(Cause::Creation);
                    producer_task.abort();
                    Outcome::ReplacedBy(cause)
                }
                joined = &mut producer_task => {
                    match joined {
                        Ok(Some(value)) => {
                            let committed = cache.commit_produced(task_key.clone(), value);
                            Outcome::Succeeded(Some(committed))
                        }
                        Ok(None) => Outcome::Succeeded(None),
                        Err(_) => Outcome::FailedOrCancelled,
                    }
                }
            };
            debug!("producer finished");
            let _ = outcome_tx.send(outcome);
            cache.inner.creation_lock.lock().finish(&task_key, id);
        });

        outcome_rx
    }

    /// Commits a value produced asynchronously, firing the replacement
    /// listener (never the eviction one) for whatever it replaced.
    fn commit_produced(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        let old = {
            let mut map = self.inner.map_lock.lock();
            self.commit_locked(&mut map, key.clone(), Arc::clone(&value))
        };
        if let Some(ref old_value) = old {
            self.inner
                .listener
                .on_removed(false, &key, old_value, Some(&value));
        }
        value
    }

    /// Follows a producer outcome to its conclusion, rejoining replacement
    /// producers and falling back to a direct map lookup when a value
    /// replaced the one being awaited.
    async fn await_outcome(&self, key: K, mut rx: watch::Receiver<Outcome<Arc<V>>>) -> Option<Arc<V>> {
        loop {
            let outcome = rx.borrow_and_update().clone();
            match outcome {
                Outcome::Pending => {
                    if rx.changed().await.is_err() {
                        return self.get_if_available(&key);
                    }
                }
                Outcome::Succeeded(value) => return value,
                Outcome::FailedOrCancelled => return None,
                Outcome::ReplacedBy(Cause::Value) => return self.get_if_available(&key),
                Outcome::ReplacedBy(Cause::Creation) => {
                    let next = {
                        let creation = self.inner.creation_lock.lock();
                        creation.join(&key)
                    };
                    match next {
                        Some(new_rx) => rx = new_rx,
                        None => return self.get_if_available(&key),
                    }
                }
            }
        }
    }
}
