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

//! An in-memory, concurrency-safe, size-bounded associative cache with
//! pluggable eviction policies and coalesced asynchronous value production.
//!
//! ```no_run
//! use std::sync::Arc;
//! use concache::{Cache, CacheConfig, Strategy};
//!
//! # async fn example() {
//! let cache: Cache<String, String> = Cache::new(CacheConfig {
//!     max_size: 1000,
//!     strategy: Strategy::Lru,
//!     executor: tokio::runtime::Handle::current(),
//!     size_of: Arc::new(|_, _| 1),
//!     listener: Default::default(),
//! })
//! .unwrap();
//!
//! cache.put("a".to_string(), "1".to_string());
//! assert_eq!(*cache.get_if_available(&"a".to_string()).unwrap(), "1");
//! # }
//! ```

mod accountant;
mod cache;
mod chain;
mod creation;
mod eviction;
mod listener;

pub use cache::{Cache, CacheConfig, ProducerHandle, SizeOf};
pub use concache_common::{ConfigError, Key, Value};
pub use creation::Cause;
pub use eviction::Strategy;
pub use listener::{NoopListener, RemovalListener};
