//! PolicyConsentService: orchestrates the validator and a store.

use crate::{ConsentValidator, SystemClock};
use async_trait::async_trait;
use consent_types::{
    ClientMeta, Clock, ConsentRecord, ConsentService, ConsentServiceError, ConsentStore,
    ConsentStoreError, VerifyOutcome, VerifySubmission,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Wait before the single storage retry.
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Service over a validator and a store. Every record it creates starts
/// Valid and later becomes Expired (passively) or Revoked (explicitly); both
/// are terminal and equivalent to callers.
pub struct PolicyConsentService<S> {
    store: S,
    validator: ConsentValidator,
    clock: Arc<dyn Clock>,
}

impl<S> PolicyConsentService<S>
where
    S: ConsentStore,
{
    pub fn new(store: S, validator: ConsentValidator) -> Self {
        Self::with_clock(store, validator, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, validator: ConsentValidator, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            validator,
            clock,
        }
    }
}

/// Call a store operation, retrying once after a short backoff. A second
/// failure surfaces as Unavailable; callers must never read that as "no
/// consent on file".
async fn with_retry<T, Fut>(
    op: &'static str,
    mut call: impl FnMut() -> Fut,
) -> Result<T, ConsentServiceError>
where
    Fut: Future<Output = Result<T, ConsentStoreError>>,
{
    match call().await {
        Ok(v) => Ok(v),
        Err(first) => {
            tracing::warn!(op, error = %first, "consent store call failed, retrying once");
            tokio::time::sleep(RETRY_BACKOFF).await;
            call()
                .await
                .map_err(|e| ConsentServiceError::Unavailable(e.to_string()))
        }
    }
}

#[async_trait]
impl<S> ConsentService for PolicyConsentService<S>
where
    S: ConsentStore + Send + Sync,
{
    async fn verify(
        &self,
        submission: VerifySubmission,
        client_meta: Option<ClientMeta>,
    ) -> Result<VerifyOutcome, ConsentServiceError> {
        let now_ms = self.clock.now_ms();
        let mut approved = match self.validator.validate(&submission, now_ms) {
            Ok(approved) => approved,
            Err(kind) => {
                tracing::info!(kind = %kind, "consent submission rejected");
                return Ok(VerifyOutcome::Rejected { kind });
            }
        };
        approved.client_meta = client_meta;

        let record = with_retry("insert", || self.store.insert(approved.clone(), now_ms)).await?;
        tracing::info!(id = %record.id, expires_at = record.expires_at, "consent recorded");
        Ok(VerifyOutcome::Accepted {
            id: record.id,
            expires_at: record.expires_at,
        })
    }

    async fn check(
        &self,
        fingerprint: &str,
        policy_version: &str,
    ) -> Result<Option<ConsentRecord>, ConsentServiceError> {
        let now_ms = self.clock.now_ms();
        with_retry("find_latest_valid", || {
            self.store
                .find_latest_valid(fingerprint, policy_version, now_ms)
        })
        .await
    }

    async fn revoke(
        &self,
        fingerprint: &str,
        policy_version: &str,
    ) -> Result<u64, ConsentServiceError> {
        let revoked = with_retry("invalidate_all", || {
            self.store.invalidate_all(fingerprint, policy_version)
        })
        .await?;
        tracing::info!(fingerprint, policy_version, revoked, "consent revoked");
        Ok(revoked)
    }

    async fn sweep(&self) -> Result<u64, ConsentServiceError> {
        let now_ms = self.clock.now_ms();
        let deleted = with_retry("sweep_expired", || self.store.sweep_expired(now_ms)).await?;
        tracing::info!(deleted, "consent sweep finished");
        Ok(deleted)
    }
}
