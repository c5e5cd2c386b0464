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

//! End-to-end scenarios exercising the documented eviction and creation
//! coalescing behavior through the public API only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use concache::{Cache, CacheConfig, Strategy};

fn config(max_size: i64, strategy: Strategy) -> CacheConfig<String, String> {
    CacheConfig {
        max_size,
        strategy,
        executor: tokio::runtime::Handle::current(),
        size_of: Arc::new(|_, _| 1),
        listener: Default::default(),
    }
}

#[test_log::test(tokio::test)]
async fn lru_basic_eviction_scenario() {
    let cache: Cache<String, String> = Cache::new(config(3, Strategy::Lru)).unwrap();
    cache.put("a".into(), "1".into());
    cache.put("b".into(), "2".into());
    cache.put("c".into(), "3".into());

    // touching "a" and "c" keeps them warmer than "b"
    assert!(cache.get_if_available(&"a".to_string()).is_some());
    assert!(cache.get_if_available(&"c".to_string()).is_some());

    cache.put("d".into(), "4".into());

    assert!(cache.get_if_available(&"b".to_string()).is_none());
    assert_eq!(cache.keys(), vec!["d", "a", "c"]);
}

#[test_log::test(tokio::test)]
async fn fifo_eviction_ignores_access_scenario() {
    let cache: Cache<String, String> = Cache::new(config(3, Strategy::Fifo)).unwrap();
    cache.put("a".into(), "1".into());
    cache.put("b".into(), "2".into());
    cache.put("c".into(), "3".into());

    // repeated access to "a" must not save it from FIFO eviction
    for _ in 0..3 {
        assert!(cache.get_if_available(&"a".to_string()).is_some());
    }

    cache.put("d".into(), "4".into());

    assert!(cache.get_if_available(&"a".to_string()).is_none());
    assert_eq!(cache.keys(), vec!["d", "c", "b"]);
}

#[test_log::test(tokio::test)]
async fn producer_coalescing_scenario() {
    let cache: Cache<String, String> = Cache::new(config(10, Strategy::Lru)).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let make_producer = |calls: Arc<AtomicUsize>| {
        move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                Some("v".to_string())
            }
        }
    };

    let c1 = cache.clone();
    let c2 = cache.clone();
    let calls1 = calls.clone();
    let calls2 = calls.clone();

    let (a, b) = tokio::join!(
        c1.get_or_put("k".to_string(), make_producer(calls1)),
        c2.get_or_put("k".to_string(), make_producer(calls2)),
    );

    assert_eq!(*a.unwrap(), "v");
    assert_eq!(*b.unwrap(), "v");
    assert_eq!(calls.load(Ordering::SeqCst), 1, "only one producer may run for a coalesced key");
}

#[test_log::test(tokio::test)]
async fn replacement_by_committed_value_scenario() {
    let cache: Cache<String, String> = Cache::new(config(10, Strategy::Lru)).unwrap();

    let handle = cache.put_async("k".to_string(), || async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Some("slow".to_string())
    });

    tokio::time::sleep(Duration::from_millis(5)).await;
    cache.put("k".to_string(), "fast".to_string());

    let joined = handle.join().await;
    assert_eq!(*joined.unwrap(), "fast");
    assert_eq!(*cache.get_if_available(&"k".to_string()).unwrap(), "fast");
}

#[test_log::test(tokio::test)]
async fn replacement_by_new_producer_scenario() {
    let cache: Cache<String, String> = Cache::new(config(10, Strategy::Lru)).unwrap();

    let first = cache.put_async("k".to_string(), || async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Some("first".to_string())
    });

    tokio::time::sleep(Duration::from_millis(5)).await;

    let second = cache.put_async("k".to_string(), || async { Some("second".to_string()) });

    let (a, b) = tokio::join!(first.join(), second.join());
    assert_eq!(*a.unwrap(), "second");
    assert_eq!(*b.unwrap(), "second");
}

#[test_log::test(tokio::test)]
async fn put_all_replacement_scenario() {
    let cache: Cache<String, String> = Cache::new(config(10, Strategy::Lru)).unwrap();
    cache.put("a".into(), "1".into());
    cache.put("b".into(), "2".into());

    let replaced = cache.put_all(vec![
        ("a".to_string(), "11".to_string()),
        ("c".to_string(), "3".to_string()),
    ]);

    assert_eq!(replaced.len(), 1);
    assert_eq!(replaced[0].0, "a");
    assert_eq!(*replaced[0].1, "1");
    assert_eq!(*replaced[0].2, "11");
    assert_eq!(*cache.get_if_available(&"c".to_string()).unwrap(), "3");
}
