//! Request and response DTOs for the consent HTTP surface (camelCase wire).

use serde::{Deserialize, Serialize};

/// Why a submission was rejected. Exactly one kind per rejection: the first
/// failing pipeline stage wins, so results are deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
    /// A required field is missing, mistyped, or empty.
    StructureInvalid,
    /// `submittedAt` falls outside the freshness window around server time.
    TimestampOutOfWindow,
    /// The recomputed checksum does not match the submitted one.
    ChecksumMismatch,
    /// `policyVersion` is not the currently active version.
    VersionMismatch,
}

impl RejectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionKind::StructureInvalid => "STRUCTURE_INVALID",
            RejectionKind::TimestampOutOfWindow => "TIMESTAMP_OUT_OF_WINDOW",
            RejectionKind::ChecksumMismatch => "CHECKSUM_MISMATCH",
            RejectionKind::VersionMismatch => "VERSION_MISMATCH",
        }
    }
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw verify submission as sent by the client.
///
/// Every field is optional so that an incomplete payload reaches the
/// structural validation stage and is rejected with `STRUCTURE_INVALID`
/// instead of a transport-level deserialization error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySubmission {
    #[serde(default)]
    pub submitted_at: Option<i64>,
    #[serde(default)]
    pub policy_version: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
}

/// Verify response: accepted with the record identity, or rejected with a
/// single error kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<RejectionKind>,
}

impl VerifyResponse {
    pub fn accepted(id: String, expires_at: i64) -> Self {
        Self {
            accepted: true,
            id: Some(id),
            expires_at: Some(expires_at),
            error_kind: None,
        }
    }

    pub fn rejected(kind: RejectionKind) -> Self {
        Self {
            accepted: false,
            id: None,
            expires_at: None,
            error_kind: Some(kind),
        }
    }
}

/// Check response: whether a live consent is on file for the pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub has_valid_consent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

/// Revoke request: invalidate every record for the pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeRequest {
    pub fingerprint: String,
    pub policy_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeResponse {
    pub revoked_count: u64,
}

/// Statistics for the periodic maintenance sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepStatus {
    pub runs: u64,
    pub total_deleted: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_deleted: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
