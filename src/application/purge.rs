//! Privileged full-cache purge, gated by the honeypot limiter and the OTP check.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{KeyValueStore, StoreError};

use super::honeypot::HoneypotLimiter;
use super::otp::OtpAuthenticator;

const METRIC_PURGE: &str = "timetable_purge_total";

#[derive(Debug, Error)]
pub enum PurgeError {
    /// Wrong code or locked-out identity. The two are deliberately indistinguishable.
    #[error("unauthorized")]
    Unauthorized,
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

impl From<StoreError> for PurgeError {
    fn from(error: StoreError) -> Self {
        Self::StoreUnavailable(error)
    }
}

#[derive(Clone)]
pub struct PurgeService {
    store: Arc<dyn KeyValueStore>,
    authenticator: Arc<OtpAuthenticator>,
    limiter: HoneypotLimiter,
}

impl PurgeService {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        authenticator: Arc<OtpAuthenticator>,
        limiter: HoneypotLimiter,
    ) -> Self {
        Self {
            store,
            authenticator,
            limiter,
        }
    }

    pub async fn store_available(&self) -> bool {
        self.store.is_alive().await
    }

    /// Flush the whole store if `code` is valid and `identity` is not locked out.
    ///
    /// A locked identity is rejected before the code is looked at. A wrong code is recorded
    /// against the identity. A correct code does not clear earlier failures.
    pub async fn purge(&self, identity: &str, code: &str) -> Result<(), PurgeError> {
        let result = self.authorize_and_flush(identity, code).await;
        let outcome = match &result {
            Ok(()) => "purged",
            Err(PurgeError::Unauthorized) => "unauthorized",
            Err(PurgeError::StoreUnavailable(_)) => "unavailable",
        };
        counter!(METRIC_PURGE, "outcome" => outcome).increment(1);
        result
    }

    async fn authorize_and_flush(&self, identity: &str, code: &str) -> Result<(), PurgeError> {
        if !self.store.is_alive().await {
            return Err(PurgeError::StoreUnavailable(StoreError::unavailable(
                "liveness probe failed",
            )));
        }

        if self.limiter.is_locked(identity).await? {
            debug!(
                target = "timetable::purge",
                identity, "rejected locked identity"
            );
            return Err(PurgeError::Unauthorized);
        }

        if !self.authenticator.verify(code) {
            let record = self.limiter.record_failure(identity).await?;
            debug!(
                target = "timetable::purge",
                identity,
                attempts = record.count,
                "rejected invalid code"
            );
            return Err(PurgeError::Unauthorized);
        }

        self.store.flush_all().await?;
        info!(target = "timetable::purge", identity, "cache purged");
        Ok(())
    }
}
