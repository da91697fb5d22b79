//! Audit trail types: one event per consent decision, with filter options.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Kind of auditable consent event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEventKind {
    Verify,
    Reject,
    Revoke,
    Sweep,
}

/// One audit event (compliance trail and debugging).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub kind: AuditEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent_id: Option<String>,
    /// Empty when the submission never got far enough to carry one.
    pub fingerprint: String,
    pub policy_version: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Options for listing audit events (filter + pagination).
#[derive(Debug, Clone, Default)]
pub struct AuditListOptions {
    pub fingerprint: Option<String>,
    pub policy_version: Option<String>,
    /// ISO8601 timestamp; return events with timestamp >= since.
    pub since: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuditStoreError {
    #[error("audit store error: {0}")]
    Other(String),
}

/// Append-only audit event store. Append failures must never fail the
/// request that produced the event.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, event: AuditEvent) -> Result<(), AuditStoreError>;

    async fn list(&self, opts: &AuditListOptions) -> Result<Vec<AuditEvent>, AuditStoreError>;
}
