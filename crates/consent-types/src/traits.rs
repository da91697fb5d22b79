//! Traits for consent storage, the service boundary, and time.

use crate::{ClientMeta, ConsentRecord, NewConsent, RejectionKind, VerifySubmission};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ConsentStoreError {
    #[error("consent store error: {0}")]
    Other(String),
}

/// Persistence abstraction for consent records.
///
/// `now_ms` is passed in by the caller so the clock stays a service-level
/// concern and expiry can be driven deterministically in tests.
#[async_trait]
pub trait ConsentStore: Send + Sync {
    /// Persist an approved submission. The store assigns the record id and
    /// computes `expires_at` from `now_ms` and its validity period.
    async fn insert(
        &self,
        consent: NewConsent,
        now_ms: i64,
    ) -> Result<ConsentRecord, ConsentStoreError>;

    /// Most recent live record for `(fingerprint, policy_version)`, or None.
    /// Live means `is_valid` and `expires_at > now_ms`; ties break on the
    /// most recent `recorded_at` (a device may legitimately resubmit).
    async fn find_latest_valid(
        &self,
        fingerprint: &str,
        policy_version: &str,
        now_ms: i64,
    ) -> Result<Option<ConsentRecord>, ConsentStoreError>;

    /// Set `is_valid = false` on every matching record, not just the latest;
    /// returns the count mutated. Idempotent: nothing left to invalidate
    /// returns 0, not an error.
    async fn invalidate_all(
        &self,
        fingerprint: &str,
        policy_version: &str,
    ) -> Result<u64, ConsentStoreError>;

    /// Delete every record with `expires_at <= now_ms` or `is_valid = false`;
    /// returns the count deleted. Only removes terminal-state records, so it
    /// is safe to run concurrently with inserts and lookups.
    async fn sweep_expired(&self, now_ms: i64) -> Result<u64, ConsentStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ConsentServiceError {
    /// Storage failed after the retry. Callers must treat this as "unknown",
    /// never as "no consent on file".
    #[error("consent storage unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a verify call: accepted with the persisted identity, or
/// rejected with the first failing stage's kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Accepted { id: String, expires_at: i64 },
    Rejected { kind: RejectionKind },
}

/// Service boundary exposed to the HTTP layer: verify / check / revoke /
/// sweep over a validator and a store.
#[async_trait]
pub trait ConsentService: Send + Sync {
    /// Run the acceptance pipeline; on approval persist a new record.
    /// Client-input failures come back as `VerifyOutcome::Rejected`, storage
    /// failures as `Err`.
    async fn verify(
        &self,
        submission: VerifySubmission,
        client_meta: Option<ClientMeta>,
    ) -> Result<VerifyOutcome, ConsentServiceError>;

    /// Pure read: the live record for the pair, if any.
    async fn check(
        &self,
        fingerprint: &str,
        policy_version: &str,
    ) -> Result<Option<ConsentRecord>, ConsentServiceError>;

    /// Invalidate every record for the pair; returns the count revoked.
    async fn revoke(
        &self,
        fingerprint: &str,
        policy_version: &str,
    ) -> Result<u64, ConsentServiceError>;

    /// Delete terminal-state records; returns the count deleted.
    async fn sweep(&self) -> Result<u64, ConsentServiceError>;
}

/// Time source in epoch milliseconds. Injected so freshness and expiry can be
/// simulated in tests.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}
