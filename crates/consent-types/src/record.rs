//! Consent record: the persisted unit of proof-of-consent and its lifecycle.

use serde::{Deserialize, Serialize};

/// Lifecycle classification of a record at a point in time.
///
/// `Expired` and `Revoked` are both terminal and equivalent from the caller's
/// point of view (no valid consent on file); they are distinguished for audit
/// and statistics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentState {
    Valid,
    Expired,
    Revoked,
}

/// Request metadata retained for audit; never consulted by validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
}

/// The persisted unit of proof-of-consent.
///
/// Insert-only from the service's perspective: the single mutation path is
/// the revoke operation flipping `is_valid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentRecord {
    /// Opaque unique id, assigned once at acceptance; never reused.
    pub id: String,
    /// Client-claimed submission time (epoch ms). Checksum input and
    /// freshness check only, never the record's canonical creation time.
    pub submitted_at: i64,
    /// Policy text version the user agreed to.
    pub policy_version: String,
    /// Device-derived heuristic identifier; cross-device collisions accepted.
    pub fingerprint: String,
    /// Integrity tag over (submitted_at, policy_version, fingerprint) + salt.
    pub checksum: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_meta: Option<ClientMeta>,
    /// Server wall-clock at acceptance (epoch ms); canonical creation time.
    pub recorded_at: i64,
    /// `recorded_at` plus the configured validity period. Derived from the
    /// server clock only, never from `submitted_at`.
    pub expires_at: i64,
    /// Starts true; flips to false only via revoke.
    pub is_valid: bool,
}

impl ConsentRecord {
    /// Whether this record still counts as valid consent at `now_ms`.
    pub fn is_live(&self, now_ms: i64) -> bool {
        self.is_valid && self.expires_at > now_ms
    }

    /// Lifecycle state at `now_ms`. Revoked wins when a record is both
    /// revoked and expired; callers treat the two identically anyway.
    pub fn state(&self, now_ms: i64) -> ConsentState {
        if !self.is_valid {
            ConsentState::Revoked
        } else if self.expires_at <= now_ms {
            ConsentState::Expired
        } else {
            ConsentState::Valid
        }
    }
}

/// An approved, normalized submission ready for persistence. The store
/// assigns the id and expiry on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConsent {
    pub submitted_at: i64,
    pub policy_version: String,
    pub fingerprint: String,
    pub checksum: String,
    #[serde(default)]
    pub client_meta: Option<ClientMeta>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(is_valid: bool, expires_at: i64) -> ConsentRecord {
        ConsentRecord {
            id: "r1".to_string(),
            submitted_at: 1_000,
            policy_version: "2.0".to_string(),
            fingerprint: "abc".to_string(),
            checksum: "tag".to_string(),
            client_meta: None,
            recorded_at: 1_000,
            expires_at,
            is_valid,
        }
    }

    #[test]
    fn live_requires_validity_and_future_expiry() {
        assert!(record(true, 2_000).is_live(1_999));
        // At exactly expires_at the record no longer counts.
        assert!(!record(true, 2_000).is_live(2_000));
        assert!(!record(false, 2_000).is_live(1_999));
    }

    #[test]
    fn terminal_states_are_independent_of_ordering() {
        assert_eq!(record(true, 2_000).state(1_000), ConsentState::Valid);
        assert_eq!(record(true, 2_000).state(2_000), ConsentState::Expired);
        assert_eq!(record(false, 2_000).state(1_000), ConsentState::Revoked);
        // Revoked and expired at once still reports a terminal state.
        assert_eq!(record(false, 2_000).state(3_000), ConsentState::Revoked);
    }
}
