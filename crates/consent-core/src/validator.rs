//! The acceptance pipeline: structural, freshness, integrity, semantic.

use crate::ConsentConfig;
use consent_checksum::checksum;
use consent_types::{NewConsent, RejectionKind, VerifySubmission};

/// Runs the four validation stages over an incoming submission.
///
/// Stages short-circuit in a fixed order, so a submission failing several
/// stages always reports the first one and results are reproducible.
pub struct ConsentValidator {
    config: ConsentConfig,
}

impl ConsentValidator {
    pub fn new(config: ConsentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConsentConfig {
        &self.config
    }

    /// Validate against server time `now_ms`. Returns the normalized
    /// submission ready for persistence, or the first failing stage's kind.
    pub fn validate(
        &self,
        submission: &VerifySubmission,
        now_ms: i64,
    ) -> Result<NewConsent, RejectionKind> {
        // Stage 1: structural.
        let submitted_at = submission
            .submitted_at
            .filter(|ts| *ts > 0)
            .ok_or(RejectionKind::StructureInvalid)?;
        let policy_version = non_empty(&submission.policy_version)?;
        let fingerprint = non_empty(&submission.fingerprint)?;
        let claimed = non_empty(&submission.checksum)?;

        // Stage 2: freshness. Rejects replayed-old submissions as well as
        // clock-skewed or future-dated ones.
        if (now_ms - submitted_at).abs() > self.config.freshness_window_ms {
            return Err(RejectionKind::TimestampOutOfWindow);
        }

        // Stage 3: integrity. Recompute from the submitted fields and the
        // server-held salt; compare constant-time.
        let expected =
            checksum::compute(submitted_at, policy_version, fingerprint, &self.config.salt);
        if !checksum::matches(&expected, claimed) {
            return Err(RejectionKind::ChecksumMismatch);
        }

        // Stage 4: semantic.
        if policy_version != self.config.active_version {
            return Err(RejectionKind::VersionMismatch);
        }

        Ok(NewConsent {
            submitted_at,
            policy_version: policy_version.to_string(),
            fingerprint: fingerprint.to_string(),
            checksum: claimed.to_string(),
            client_meta: None,
        })
    }
}

fn non_empty(field: &Option<String>) -> Result<&str, RejectionKind> {
    match field.as_deref() {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(RejectionKind::StructureInvalid),
    }
}
