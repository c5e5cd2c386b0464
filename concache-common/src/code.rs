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

use std::hash::Hash;

/// Bound satisfied by any type usable as a cache key. `Clone` is required
/// because a key is stored once in the ordered map's index and potentially
/// again in the creation registry, and is handed back in full in key
/// snapshots (`keys`, `under_creation_keys`, `all_keys`).
pub trait Key: Hash + Eq + Clone + Send + Sync + 'static {}
impl<T: Hash + Eq + Clone + Send + Sync + 'static> Key for T {}

/// Bound satisfied by any type usable as a cache value.
pub trait Value: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Value for T {}
