//! Integrity checksum over the consent tuple plus a shared salt.
//!
//! The salt is compiled into both the client bundle and the server, so it is
//! visible to anyone who inspects the bundle. The checksum is therefore
//! tamper-evidence (it catches accidental or naive corruption of a locally
//! stored record), not tamper-proofing: an attacker who reads the bundle can
//! recompute a valid checksum for arbitrary fields.

use sha2::{Digest, Sha256};

/// Default salt compiled into both sides. Deployments may override it through
/// configuration, but client and server must agree on the value.
pub const EMBEDDED_SALT: &str = "pcv-0f8e6d1c-consent-salt";

/// `checksum = hex(SHA-256(submitted_at "|" policy_version "|" fingerprint salt))`.
///
/// Field order and the absence of a delimiter before the salt are part of the
/// shared contract with the client bundle.
pub fn compute(submitted_at: i64, policy_version: &str, fingerprint: &str, salt: &str) -> String {
    let input = format!("{}|{}|{}{}", submitted_at, policy_version, fingerprint, salt);
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Constant-time comparison of a claimed checksum against the expected one.
pub fn matches(expected: &str, claimed: &str) -> bool {
    let (a, b) = (expected.as_bytes(), claimed.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}
