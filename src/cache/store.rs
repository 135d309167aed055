//! Key-value store abstraction consumed by the cache and the honeypot limiter.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {message}")]
    Unavailable { message: String },
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("store command failed: {message}")]
    Command { message: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }
}

/// TTL-capable key-value backend.
///
/// Implementations bound every operation by their own connection timeout, so callers can
/// treat a slow store like a down one. `incr_expiring` and `set_ex` must be atomic per key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Increment the integer at `key` in one atomic step.
    ///
    /// A key created by this call starts at 1 and expires after `ttl`. An existing key keeps
    /// its remaining expiry, so the window is measured from creation.
    async fn incr_expiring(&self, key: &str, ttl: Duration) -> Result<i64, StoreError>;

    /// Liveness probe. Never errors: an unreachable store is simply not alive.
    async fn is_alive(&self) -> bool;

    /// Drop every key in the store.
    async fn flush_all(&self) -> Result<(), StoreError>;
}
