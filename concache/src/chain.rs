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

//! The ordered keyed map (component C1): a hash index over an arena of
//! doubly linked slots. `Tail` is always the "most-recent"/"newest" end;
//! `Head` is always the "least-recent"/"oldest" end, independent of the
//! chain mode. Inserts always land at `Tail`; only access-ordered `get`
//! moves an existing entry there.

use std::hash::BuildHasher;

use ahash::RandomState;
use concache_common::{Key, Value};
use hashbrown::HashMap;

/// Which end of the chain an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    /// Least-recently-used / oldest end.
    Head,
    /// Most-recently-used / newest end.
    Tail,
}

impl End {
    pub fn opposite(self) -> End {
        match self {
            End::Head => End::Tail,
            End::Tail => End::Head,
        }
    }
}

/// Whether `get` reorders the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainMode {
    /// `get` moves the hit entry to `Tail`.
    AccessOrder,
    /// `get` never reorders; only inserts touch the chain.
    InsertionOrder,
}

struct Slot<K, V> {
    key: K,
    value: V,
    size: i64,
    prev: Option<u32>,
    next: Option<u32>,
}

/// An O(1) insert/lookup/remove map maintaining a doubly linked chain.
pub struct OrderedMap<K, V, S = RandomState> {
    index: HashMap<K, u32, S>,
    slots: Vec<Option<Slot<K, V>>>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    mode: ChainMode,
}

impl<K, V, S> OrderedMap<K, V, S>
where
    K: Key + Clone,
    V: Value,
    S: BuildHasher + Default,
{
    pub fn new(mode: ChainMode) -> Self {
        Self::with_hasher(mode, S::default())
    }
}

impl<K, V, S> OrderedMap<K, V, S>
where
    K: Key + Clone,
    V: Value,
    S: BuildHasher,
{
    pub fn with_hasher(mode: ChainMode, hasher: S) -> Self {
        Self {
            index: HashMap::with_hasher(hasher),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            mode,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Inserts or replaces `key`. Returns the previous `(value, size)` if any.
    pub fn put(&mut self, key: K, value: V, size: i64) -> Option<(V, i64)> {
        if let Some(&id) = self.index.get(&key) {
            let slot = self.slots[id as usize].as_mut().expect("live slot");
            let old_value = std::mem::replace(&mut slot.value, value);
            let old_size = std::mem::replace(&mut slot.size, size);
            if self.mode == ChainMode::AccessOrder {
                self.move_to_back(id);
            }
            return Some((old_value, old_size));
        }
        let id = self.alloc(key, value, size);
        self.link_back(id);
        None
    }

    /// Looks up `key`. In access-ordered mode, a hit moves the entry to `Tail`.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let id = *self.index.get(key)?;
        if self.mode == ChainMode::AccessOrder {
            self.move_to_back(id);
        }
        Some(&self.slots[id as usize].as_ref().expect("live slot").value)
    }

    /// Looks up `key` without ever reordering the chain.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let id = *self.index.get(key)?;
        Some(&self.slots[id as usize].as_ref().expect("live slot").value)
    }

    pub fn remove(&mut self, key: &K) -> Option<(V, i64)> {
        let id = *self.index.get(key)?;
        let (_, v, s) = self.unlink_and_take(id);
        Some((v, s))
    }

    /// Removes and returns the entry at `end`, if any.
    pub fn pop(&mut self, end: End) -> Option<(K, V, i64)> {
        let id = match end {
            End::Head => self.head,
            End::Tail => self.tail,
        }?;
        Some(self.unlink_and_take(id))
    }

    /// Walks the chain from `start` toward the opposite end, invoking
    /// `visit` on each entry before removing it. Stops once `visit`
    /// returns `true` (the entry it was called on is still removed).
    pub fn remove_while<F>(&mut self, start: End, mut visit: F) -> Vec<(K, V, i64)>
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut removed = Vec::new();
        let mut cur = match start {
            End::Head => self.head,
            End::Tail => self.tail,
        };
        while let Some(id) = cur {
            let (done, next) = {
                let slot = self.slots[id as usize].as_ref().expect("live slot");
                let done = visit(&slot.key, &slot.value);
                let next = match start {
                    End::Head => slot.next,
                    End::Tail => slot.prev,
                };
                (done, next)
            };
            removed.push(self.unlink_and_take(id));
            if done {
                break;
            }
            cur = next;
        }
        removed
    }

    /// Removes every entry, in order starting from `start`.
    pub fn drain(&mut self, start: End) -> Vec<(K, V, i64)> {
        self.remove_while(start, |_, _| false)
    }

    /// Snapshot of keys walking from `start` toward the opposite end.
    pub fn keys_from(&self, start: End) -> Vec<K> {
        let mut out = Vec::with_capacity(self.len());
        let mut cur = match start {
            End::Head => self.head,
            End::Tail => self.tail,
        };
        while let Some(id) = cur {
            let slot = self.slots[id as usize].as_ref().expect("live slot");
            out.push(slot.key.clone());
            cur = match start {
                End::Head => slot.next,
                End::Tail => slot.prev,
            };
        }
        out
    }

    fn alloc(&mut self, key: K, value: V, size: i64) -> u32 {
        let slot = Slot {
            key: key.clone(),
            value,
            size,
            prev: None,
            next: None,
        };
        let id = if let Some(id) = self.free.pop() {
            self.slots[id as usize] = Some(slot);
            id
        } else {
            let id = self.slots.len() as u32;
            self.slots.push(Some(slot));
            id
        };
        self.index.insert(key, id);
        id
    }

    fn link_back(&mut self, id: u32) {
        let slot = self.slots[id as usize].as_mut().expect("live slot");
        slot.prev = self.tail;
        slot.next = None;
        match self.tail {
            Some(t) => self.slots[t as usize].as_mut().expect("live slot").next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }

    fn unlink_keep(&mut self, id: u32) {
        let (prev, next) = {
            let slot = self.slots[id as usize].as_mut().expect("live slot");
            let prev = slot.prev.take();
            let next = slot.next.take();
            (prev, next)
        };
        match prev {
            Some(p) => self.slots[p as usize].as_mut().expect("live slot").next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n as usize].as_mut().expect("live slot").prev = prev,
            None => self.tail = prev,
        }
    }

    fn move_to_back(&mut self, id: u32) {
        if self.tail == Some(id) {
            return;
        }
        self.unlink_keep(id);
        self.link_back(id);
    }

    fn unlink_and_take(&mut self, id: u32) -> (K, V, i64) {
        self.unlink_keep(id);
        let slot = self.slots[id as usize].take().expect("live slot");
        self.index.remove(&slot.key);
        self.free.push(id);
        (slot.key, slot.value, slot.size)
    }
}
