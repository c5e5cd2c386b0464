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

//! The creation registry (component C4): at most one producer in flight
//! per key. Concurrent callers for the same key join the same outcome
//! instead of running their own producer; a producer that replaces another
//! sends it a structured [`Cause`] instead of relying on an untyped
//! `JoinHandle::abort()`.

use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::RandomState;
use concache_common::{Key, Value};
use hashbrown::HashMap;
use tokio::sync::watch;

/// Why an awaited producer never committed a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    /// Replaced by a newer producer for the same key (`put_with`/`get_or_put`/`put_async`).
    Creation,
    /// Replaced by a directly committed value (`put`/`put_all`) or a removal.
    Value,
}

/// The result an awaiter of a producer handle ultimately observes.
#[derive(Clone)]
pub(crate) enum Outcome<V> {
    /// The producer has not yet finished.
    Pending,
    /// The producer returned normally; `None` if it returned no value.
    Succeeded(Option<V>),
    /// The producer panicked or was aborted before returning; no commit
    /// happened and the cause cannot be distinguished from a plain `None`
    /// return, matching the host contract that a failed producer is
    /// observationally the same as an absent value.
    FailedOrCancelled,
    /// A newer registration replaced this one before it finished.
    ReplacedBy(Cause),
}

/// A single producer registration: the cancel signal a replacement sends
/// it, and the outcome channel awaiters subscribe to.
struct Inflight<V> {
    id: u64,
    cancel_tx: watch::Sender<Option<Cause>>,
    outcome_rx: watch::Receiver<Outcome<V>>,
}

/// The producer side of a fresh registration: what `Cache` needs to drive
/// the spawned task (`cancel_rx`/`outcome_tx`) and to reap it when done
/// (`id`), plus an `outcome_rx` ready to hand to the caller that started it.
pub(crate) struct Registration<V> {
    pub(crate) id: u64,
    pub(crate) cancel_rx: watch::Receiver<Option<Cause>>,
    pub(crate) outcome_tx: watch::Sender<Outcome<V>>,
    pub(crate) outcome_rx: watch::Receiver<Outcome<V>>,
}

/// `creationLock`'s protected state: at most one in-flight producer per key.
pub(crate) struct CreationRegistry<K, V, S = RandomState> {
    inflight: HashMap<K, Inflight<V>, S>,
    next_id: AtomicU64,
}

impl<K, V, S> CreationRegistry<K, V, S>
where
    K: Key,
    V: Value,
    S: BuildHasher + Default,
{
    pub(crate) fn new() -> Self {
        Self {
            inflight: HashMap::default(),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<K, V, S> CreationRegistry<K, V, S>
where
    K: Key,
    V: Value,
    S: BuildHasher,
{
    pub(crate) fn is_in_flight(&self, key: &K) -> bool {
        self.inflight.contains_key(key)
    }

    /// Subscribes to the producer currently registered for `key`, if any.
    pub(crate) fn join(&self, key: &K) -> Option<watch::Receiver<Outcome<V>>> {
        self.inflight.get(key).map(|i| i.outcome_rx.clone())
    }

    /// Registers a new producer for `key`, cancelling (with [`Cause::Creation`])
    /// whatever was previously registered there. Returns the resources the
    /// caller needs to drive the spawned producer task and to reap the
    /// registration once it completes.
    pub(crate) fn register(&mut self, key: K) -> Registration<V> {
        if let Some(previous) = self.inflight.remove(&key) {
            let _ = previous.cancel_tx.send(Some(Cause::Creation));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = watch::channel(None);
        let (outcome_tx, outcome_rx) = watch::channel(Outcome::Pending);
        self.inflight.insert(
            key,
            Inflight {
                id,
                cancel_tx,
                outcome_rx: outcome_rx.clone(),
            },
        );
        Registration {
            id,
            cancel_rx,
            outcome_tx,
            outcome_rx,
        }
    }

    /// Cancels whatever producer is registered for `key`, if any, with the
    /// given cause. Used by `put`, `put_all`, `remove`, `clear`, `evict_all`
    /// and `remove_all_under_creation`.
    pub(crate) fn cancel(&mut self, key: &K, cause: Cause) {
        if let Some(inflight) = self.inflight.remove(key) {
            let _ = inflight.cancel_tx.send(Some(cause));
        }
    }

    /// Removes the registration for `key` iff it is still the one
    /// identified by `id` — guards against reaping a registration that
    /// replaced this one in the meantime.
    pub(crate) fn finish(&mut self, key: &K, id: u64) {
        if self.inflight.get(key).is_some_and(|i| i.id == id) {
            self.inflight.remove(key);
        }
    }

    /// Snapshot of every key with a producer currently in flight.
    pub(crate) fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.inflight.keys().cloned().collect()
    }

    /// Cancels every in-flight producer, in no particular order.
    pub(crate) fn cancel_all(&mut self, cause: Cause) {
        for (_, inflight) in self.inflight.drain() {
            let _ = inflight.cancel_tx.send(Some(cause));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Reg = CreationRegistry<u64, String, RandomState>;

    #[test]
    fn test_register_then_join_sees_same_channel() {
        let mut reg: Reg = CreationRegistry::new();
        let registration = reg.register(1);
        assert!(reg.is_in_flight(&1));
        let joined = reg.join(&1).expect("in flight");
        assert_eq!(registration.outcome_rx.borrow().clone(), *joined.borrow());
    }

    #[test]
    fn test_register_twice_cancels_first_with_creation_cause() {
        let mut reg: Reg = CreationRegistry::new();
        let mut first = reg.register(1);
        let _second = reg.register(1);
        assert_eq!(*first.cancel_rx.borrow_and_update(), Some(Cause::Creation));
    }

    #[test]
    fn test_finish_guards_against_stale_id() {
        let mut reg: Reg = CreationRegistry::new();
        let first = reg.register(1);
        let _second = reg.register(1);
        // first.id no longer matches the live registration; finishing it
        // must not reap the second registration.
        reg.finish(&1, first.id);
        assert!(reg.is_in_flight(&1));
    }

    #[test]
    fn test_cancel_all_signals_every_key() {
        let mut reg: Reg = CreationRegistry::new();
        let a = reg.register(1);
        let b = reg.register(2);
        reg.cancel_all(Cause::Value);
        assert!(!reg.is_in_flight(&1));
        assert!(!reg.is_in_flight(&2));
        assert_eq!(*a.cancel_rx.clone().borrow(), Some(Cause::Value));
        assert_eq!(*b.cancel_rx.clone().borrow(), Some(Cause::Value));
    }
}

impl<V> PartialEq for Outcome<V>
where
    V: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Outcome::Pending, Outcome::Pending) => true,
            (Outcome::Succeeded(a), Outcome::Succeeded(b)) => a == b,
            (Outcome::FailedOrCancelled, Outcome::FailedOrCancelled) => true,
            (Outcome::ReplacedBy(a), Outcome::ReplacedBy(b)) => a == b,
            _ => false,
        }
    }
}
