use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use timetable::cache::{
    CacheAsideFetcher, CacheConfig, KeyValueStore, Lookup, LookupKind, StoreError, cache_key,
};
use timetable::domain::error::SourceError;
use timetable::domain::query::QueryParams;
use timetable::infra::store::MemoryStore;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Payload {
    value: String,
}

fn payload(value: &str) -> Payload {
    Payload {
        value: value.to_string(),
    }
}

/// Wraps a memory store and records every write with its TTL.
#[derive(Default)]
struct RecordingStore {
    inner: MemoryStore,
    writes: Mutex<Vec<(String, Duration)>>,
    fail_reads: bool,
    fail_writes: bool,
}

#[async_trait]
impl KeyValueStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::command("read rejected"));
        }
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.writes.lock().await.push((key.to_string(), ttl));
        if self.fail_writes {
            return Err(StoreError::unavailable("write rejected"));
        }
        self.inner.set_ex(key, value, ttl).await
    }

    async fn incr_expiring(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        self.inner.incr_expiring(key, ttl).await
    }

    async fn is_alive(&self) -> bool {
        self.inner.is_alive().await
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        self.inner.flush_all().await
    }
}

struct Producer {
    calls: AtomicUsize,
}

impl Producer {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    async fn ok(&self, value: &str) -> Result<Payload, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(payload(value))
    }

    async fn fail(&self) -> Result<Payload, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SourceError::user("Missing course_id in query parameters"))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn settle() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn store_down_passes_through_every_time() {
    let store = Arc::new(MemoryStore::new());
    store.set_alive(false);
    let fetcher = CacheAsideFetcher::new(store.clone(), CacheConfig::default());
    let producer = Producer::new();
    let params = QueryParams::new();

    for _ in 0..3 {
        let lookup = Lookup::new(LookupKind::Courses, "unicam", &params);
        let value = fetcher
            .fetch(lookup, || producer.ok("live"))
            .await
            .expect("value");
        assert_eq!(value, payload("live"));
    }

    settle().await;
    assert_eq!(producer.calls(), 3);
    store.set_alive(true);
    assert!(store.is_empty());
}

#[tokio::test]
async fn equal_parameters_share_one_entry() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = CacheAsideFetcher::new(store.clone(), CacheConfig::default());
    let producer = Producer::new();

    let first = QueryParams::from_pairs([("course_id", "L-31"), ("year", "2")]);
    let second = QueryParams::from_pairs([("Year", "2"), ("course_id", "L-31")]);

    let value = fetcher
        .fetch(Lookup::new(LookupKind::Lessons, "unicam", &first), || {
            producer.ok("v1")
        })
        .await
        .expect("first");
    assert_eq!(value, payload("v1"));
    settle().await;

    let value = fetcher
        .fetch(Lookup::new(LookupKind::Lessons, "unicam", &second), || {
            producer.ok("v2")
        })
        .await
        .expect("second");
    assert_eq!(value, payload("v1"));
    assert_eq!(producer.calls(), 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn different_parameters_are_cached_separately() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = CacheAsideFetcher::new(store.clone(), CacheConfig::default());
    let producer = Producer::new();

    let plain = QueryParams::new();
    let filtered = QueryParams::from_pairs([("course_id", "L-31")]);

    fetcher
        .fetch(Lookup::new(LookupKind::Lessons, "unicam", &plain), || {
            producer.ok("all")
        })
        .await
        .expect("plain");
    fetcher
        .fetch(Lookup::new(LookupKind::Lessons, "unicam", &filtered), || {
            producer.ok("one")
        })
        .await
        .expect("filtered");
    settle().await;

    assert_eq!(producer.calls(), 2);
    assert!(
        store
            .get("lessons:unicam")
            .await
            .expect("get")
            .is_some()
    );
    assert!(
        store
            .get(&cache_key(LookupKind::Lessons, "unicam", &filtered))
            .await
            .expect("get")
            .is_some()
    );
}

#[tokio::test]
async fn writes_use_the_ttl_of_the_volatility_class() {
    let store = Arc::new(RecordingStore::default());
    let fetcher = CacheAsideFetcher::new(store.clone(), CacheConfig::default());
    let producer = Producer::new();
    let params = QueryParams::new();

    fetcher
        .fetch(Lookup::new(LookupKind::Courses, "unicam", &params), || {
            producer.ok("catalog")
        })
        .await
        .expect("courses");
    fetcher
        .fetch(Lookup::new(LookupKind::Lessons, "unicam", &params), || {
            producer.ok("schedule")
        })
        .await
        .expect("lessons");
    settle().await;

    let mut writes = store.writes.lock().await.clone();
    writes.sort();
    assert_eq!(
        writes,
        vec![
            ("courses:unicam".to_string(), Duration::from_secs(1_814_400)),
            ("lessons:unicam".to_string(), Duration::from_secs(259_200)),
        ]
    );
}

#[tokio::test]
async fn producer_errors_pass_through_and_are_not_cached() {
    let store = Arc::new(RecordingStore::default());
    let fetcher = CacheAsideFetcher::new(store.clone(), CacheConfig::default());
    let producer = Producer::new();
    let params = QueryParams::new();

    let err = fetcher
        .fetch(Lookup::new(LookupKind::Lessons, "unicam", &params), || {
            producer.fail()
        })
        .await
        .expect_err("producer failure");
    assert_eq!(
        err,
        SourceError::user("Missing course_id in query parameters")
    );
    settle().await;
    assert!(store.writes.lock().await.is_empty());

    fetcher
        .fetch(Lookup::new(LookupKind::Lessons, "unicam", &params), || {
            producer.fail()
        })
        .await
        .expect_err("still failing");
    assert_eq!(producer.calls(), 2);
}

#[tokio::test]
async fn failed_writes_never_reach_the_caller() {
    let store = Arc::new(RecordingStore {
        fail_writes: true,
        ..Default::default()
    });
    let fetcher = CacheAsideFetcher::new(store.clone(), CacheConfig::default());
    let producer = Producer::new();
    let params = QueryParams::new();

    for _ in 0..2 {
        let value = fetcher
            .fetch(Lookup::new(LookupKind::Courses, "unicam", &params), || {
                producer.ok("fresh")
            })
            .await
            .expect("value despite write failure");
        assert_eq!(value, payload("fresh"));
        settle().await;
    }

    assert_eq!(producer.calls(), 2);
    assert_eq!(store.writes.lock().await.len(), 2);
}

#[tokio::test]
async fn failed_reads_bypass_without_writing() {
    let store = Arc::new(RecordingStore {
        fail_reads: true,
        ..Default::default()
    });
    let fetcher = CacheAsideFetcher::new(store.clone(), CacheConfig::default());
    let producer = Producer::new();
    let params = QueryParams::new();

    let value = fetcher
        .fetch(Lookup::new(LookupKind::Courses, "unicam", &params), || {
            producer.ok("direct")
        })
        .await
        .expect("value");
    settle().await;

    assert_eq!(value, payload("direct"));
    assert!(store.writes.lock().await.is_empty());
}

#[tokio::test]
async fn undecodable_entry_is_refetched_and_overwritten() {
    let store = Arc::new(MemoryStore::new());
    store
        .set_ex("courses:unicam", "{not json", Duration::from_secs(60))
        .await
        .expect("seed");
    let fetcher = CacheAsideFetcher::new(store.clone(), CacheConfig::default());
    let producer = Producer::new();
    let params = QueryParams::new();

    let value = fetcher
        .fetch(Lookup::new(LookupKind::Courses, "unicam", &params), || {
            producer.ok("repaired")
        })
        .await
        .expect("value");
    settle().await;

    assert_eq!(value, payload("repaired"));
    assert_eq!(producer.calls(), 1);
    let cached = store
        .get("courses:unicam")
        .await
        .expect("get")
        .expect("overwritten");
    assert_eq!(
        serde_json::from_str::<Payload>(&cached).expect("decodes"),
        payload("repaired")
    );
}

#[tokio::test]
async fn disabled_cache_never_touches_the_store() {
    let store = Arc::new(RecordingStore::default());
    let config = CacheConfig {
        enabled: false,
        ..Default::default()
    };
    let fetcher = CacheAsideFetcher::new(store.clone(), config);
    let producer = Producer::new();
    let params = QueryParams::new();

    for _ in 0..2 {
        fetcher
            .fetch(Lookup::new(LookupKind::Courses, "unicam", &params), || {
                producer.ok("live")
            })
            .await
            .expect("value");
        settle().await;
    }

    assert_eq!(producer.calls(), 2);
    assert!(store.writes.lock().await.is_empty());
}
