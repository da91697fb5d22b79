//! Device fingerprint derivation from environment signals.
//!
//! Contract: same device + same browser build => same fingerprint with high
//! probability; different devices => different fingerprints with high
//! probability. This is a heuristic identifier, not a security credential;
//! nothing downstream may assume it is forgery-proof, and cross-device
//! collisions are accepted.

use sha2::{Digest, Sha256};

/// Fixed delimiter between signals.
const SIGNAL_DELIMITER: &str = "||";

/// Truncated digest length in hex chars (128 bits).
const FINGERPRINT_LEN: usize = 32;

/// Ordered environment signals a client gathers before consenting. The field
/// order below is the concatenation order and must not change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSignals {
    pub user_agent: String,
    /// BCP 47 locale tag, e.g. "en-US".
    pub language: String,
    /// Screen resolution as "WIDTHxHEIGHT".
    pub screen_resolution: String,
    /// Timezone offset from UTC in minutes.
    pub timezone_offset_min: i32,
    /// Rendering-engine fingerprint, e.g. a canvas draw hash.
    pub canvas_hash: String,
    /// Logical processor count.
    pub hardware_concurrency: u32,
    pub touch_support: bool,
}

/// Join the signals in fixed order, hash, truncate. The digest must be
/// stable across builds and platforms so a device keeps its identifier.
pub fn derive_fingerprint(signals: &DeviceSignals) -> String {
    let joined = [
        signals.user_agent.as_str(),
        signals.language.as_str(),
        signals.screen_resolution.as_str(),
        &signals.timezone_offset_min.to_string(),
        signals.canvas_hash.as_str(),
        &signals.hardware_concurrency.to_string(),
        if signals.touch_support { "1" } else { "0" },
    ]
    .join(SIGNAL_DELIMITER);
    let mut digest = hex::encode(Sha256::digest(joined.as_bytes()));
    digest.truncate(FINGERPRINT_LEN);
    digest
}
