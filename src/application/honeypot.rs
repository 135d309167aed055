//! Failed-authentication counter guarding the privileged purge operation.
//!
//! Each client identity moves through `Clean -> Watched(n) -> Locked`. State lives entirely
//! in the key-value store: the counter is created by the first failure together with its
//! expiry in one store call, incremented by later failures without refreshing it, and only
//! ever cleared by that expiry. A successful verification does not reset it.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::warn;

use crate::cache::{KeyValueStore, StoreError};

const KEY_PREFIX: &str = "honeypot:ip";
const DEFAULT_THRESHOLD: u32 = 5;
const DEFAULT_WINDOW_SECS: u64 = 60 * 60 * 2;
const METRIC_HONEYPOT_LOCKOUT: &str = "timetable_honeypot_lockout_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures tolerated; the identity locks once the count exceeds this.
    pub threshold: u32,
    /// Counter lifetime, measured from the first failure.
    pub window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            window: Duration::from_secs(DEFAULT_WINDOW_SECS),
        }
    }
}

impl From<&crate::config::AdminSettings> for LockoutPolicy {
    fn from(settings: &crate::config::AdminSettings) -> Self {
        Self {
            threshold: settings.lockout_threshold.get(),
            window: settings.lockout_window,
        }
    }
}

/// Result of recording one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureRecord {
    pub count: i64,
    /// True only for the failure that crossed the threshold.
    pub newly_locked: bool,
}

#[derive(Clone)]
pub struct HoneypotLimiter {
    store: Arc<dyn KeyValueStore>,
    policy: LockoutPolicy,
}

impl HoneypotLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, policy: LockoutPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    pub async fn is_locked(&self, identity: &str) -> Result<bool, StoreError> {
        let raw = self.store.get(&counter_key(identity)).await?;
        let count = raw
            .as_deref()
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(0);
        Ok(count > i64::from(self.policy.threshold))
    }

    pub async fn record_failure(&self, identity: &str) -> Result<FailureRecord, StoreError> {
        let key = counter_key(identity);
        let count = self.store.incr_expiring(&key, self.policy.window).await?;

        let newly_locked = count == i64::from(self.policy.threshold) + 1;
        if newly_locked {
            warn!(
                target = "timetable::honeypot",
                identity,
                attempts = count,
                window_secs = self.policy.window.as_secs(),
                "identity locked out after repeated failed attempts"
            );
            counter!(METRIC_HONEYPOT_LOCKOUT).increment(1);
        }

        Ok(FailureRecord {
            count,
            newly_locked,
        })
    }
}

fn counter_key(identity: &str) -> String {
    format!("{KEY_PREFIX}:{identity}")
}
