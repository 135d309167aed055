//! Key-value store backends.

mod memory;
mod redis_store;

use std::sync::Arc;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::cache::KeyValueStore;
use crate::config::{StoreBackend, StoreSettings};

use super::error::InfraError;

/// Build the configured store. Redis is connected lazily, so this succeeds even when the
/// server is down.
pub fn build_store(settings: &StoreSettings) -> Result<Arc<dyn KeyValueStore>, InfraError> {
    match settings.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Redis => {
            let store = RedisStore::new(&settings.url, settings.timeout)?;
            Ok(Arc::new(store))
        }
    }
}
