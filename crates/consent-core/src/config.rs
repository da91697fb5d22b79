//! Configuration for the verification pipeline.

use consent_checksum::EMBEDDED_SALT;

/// Maximum allowed skew between client-claimed submission time and server
/// time, in either direction.
pub const DEFAULT_FRESHNESS_WINDOW_MS: i64 = 20_000;

/// How long a granted consent remains acceptable before re-consent (30 days).
pub const DEFAULT_VALIDITY_PERIOD_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Explicit configuration value constructed in the binary and passed into
/// the validator and service; never a process-wide singleton.
///
/// The freshness window and the validity period are independent constants:
/// one bounds clock skew at submission time, the other bounds how long an
/// accepted record lasts. They must not be conflated.
#[derive(Debug, Clone)]
pub struct ConsentConfig {
    /// The currently active policy version; submissions must match it.
    pub active_version: String,
    pub freshness_window_ms: i64,
    pub validity_period_ms: i64,
    /// Checksum salt shared with the client bundle.
    pub salt: String,
}

impl ConsentConfig {
    pub fn new(active_version: impl Into<String>) -> Self {
        Self {
            active_version: active_version.into(),
            freshness_window_ms: DEFAULT_FRESHNESS_WINDOW_MS,
            validity_period_ms: DEFAULT_VALIDITY_PERIOD_MS,
            salt: EMBEDDED_SALT.to_string(),
        }
    }

    /// Defaults with environment overrides; used by the server binary.
    pub fn from_env() -> Self {
        let mut config = Self::new(
            std::env::var("CONSENT_ACTIVE_VERSION").unwrap_or_else(|_| "1.0".to_string()),
        );
        if let Some(ms) = env_i64("CONSENT_FRESHNESS_WINDOW_MS") {
            config.freshness_window_ms = ms;
        }
        if let Some(ms) = env_i64("CONSENT_VALIDITY_PERIOD_MS") {
            config.validity_period_ms = ms;
        }
        if let Ok(salt) = std::env::var("CONSENT_SALT") {
            config.salt = salt;
        }
        config
    }
}

fn env_i64(name: &str) -> Option<i64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
