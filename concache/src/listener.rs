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

use concache_common::{Key, Value};

/// Observes every removal or replacement committed by a [`crate::cache::Cache`].
///
/// Called synchronously, under `mapLock`, for evictions and `clear`/`evict_all`;
/// called after `mapLock` is released for `put`/`put_all` replacements and
/// explicit `remove`. An implementation must never call back into the cache
/// that invoked it — doing so is undefined behavior and can deadlock.
pub trait RemovalListener<K, V>: Send + Sync + 'static
where
    K: Key,
    V: Value,
{
    /// `evicted` is `true` iff the removal came from the eviction engine or
    /// `evict_all`. `new_value` is `Some` only for `put`/`put_all` replacements.
    #[allow(unused_variables)]
    fn on_removed(&self, evicted: bool, key: &K, old_value: &V, new_value: Option<&V>) {}
}

/// The default, no-op listener.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl<K, V> RemovalListener<K, V> for NoopListener
where
    K: Key,
    V: Value,
{
}
