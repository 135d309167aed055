//! Cache-aside fetcher.
//!
//! Consults the store before invoking a producer and repopulates it on miss.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::domain::query::QueryParams;

use super::config::CacheConfig;
use super::keys::{LookupKind, cache_key};
use super::store::KeyValueStore;

const METRIC_CACHE_HIT: &str = "timetable_cache_hit_total";
const METRIC_CACHE_MISS: &str = "timetable_cache_miss_total";
const METRIC_CACHE_BYPASS: &str = "timetable_cache_bypass_total";
const METRIC_CACHE_WRITE_FAILED: &str = "timetable_cache_write_failed_total";

/// What is being looked up: kind, owning source, and normalized parameters.
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    pub kind: LookupKind,
    pub denomination: &'a str,
    pub params: &'a QueryParams,
}

impl<'a> Lookup<'a> {
    pub fn new(kind: LookupKind, denomination: &'a str, params: &'a QueryParams) -> Self {
        Self {
            kind,
            denomination,
            params,
        }
    }

    pub fn key(&self) -> String {
        cache_key(self.kind, self.denomination, self.params)
    }
}

/// Wraps expensive producers with cache-aside reads and fire-and-forget writes.
///
/// Store trouble never reaches the caller: a down store means the producer is called
/// directly, a failed write is logged and dropped. Producer errors pass through untouched
/// and are never cached.
#[derive(Clone)]
pub struct CacheAsideFetcher {
    store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
}

impl CacheAsideFetcher {
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub async fn fetch<T, E, F, Fut>(&self, lookup: Lookup<'_>, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.config.enabled {
            return producer().await;
        }

        let namespace = lookup.kind.namespace();

        if !self.store.is_alive().await {
            debug!(
                target = "timetable::cache",
                namespace,
                denomination = lookup.denomination,
                "store down, calling producer directly"
            );
            counter!(METRIC_CACHE_BYPASS, "reason" => "store_down").increment(1);
            return producer().await;
        }

        let key = lookup.key();

        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    counter!(METRIC_CACHE_HIT, "namespace" => namespace).increment(1);
                    return Ok(value);
                }
                Err(err) => {
                    warn!(
                        target = "timetable::cache",
                        key = %key,
                        error = %err,
                        "cached entry could not be decoded, refetching"
                    );
                    counter!(METRIC_CACHE_MISS, "namespace" => namespace).increment(1);
                }
            },
            Ok(None) => {
                counter!(METRIC_CACHE_MISS, "namespace" => namespace).increment(1);
            }
            Err(err) => {
                warn!(
                    target = "timetable::cache",
                    key = %key,
                    error = %err,
                    "cache read failed, calling producer directly"
                );
                counter!(METRIC_CACHE_BYPASS, "reason" => "read_failed").increment(1);
                return producer().await;
            }
        }

        let value = producer().await?;
        let ttl = self.config.ttl_for(lookup.kind.volatility());
        self.repopulate(key, &value, ttl);
        Ok(value)
    }

    /// Schedule the write without awaiting it; the response never waits on the store.
    fn repopulate<T: Serialize>(&self, key: String, value: &T, ttl: Duration) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    target = "timetable::cache",
                    key = %key,
                    error = %err,
                    "failed to encode entry for caching"
                );
                counter!(METRIC_CACHE_WRITE_FAILED).increment(1);
                return;
            }
        };

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(err) = store.set_ex(&key, &payload, ttl).await {
                warn!(
                    target = "timetable::cache",
                    key = %key,
                    error = %err,
                    "cache write failed"
                );
                counter!(METRIC_CACHE_WRITE_FAILED).increment(1);
            }
        });
    }
}
