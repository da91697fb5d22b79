//! Consent acceptance pipeline and service orchestration.

mod clock;
mod config;
mod service;
mod validator;

#[cfg(any(test, feature = "test-util"))]
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use config::{ConsentConfig, DEFAULT_FRESHNESS_WINDOW_MS, DEFAULT_VALIDITY_PERIOD_MS};
pub use service::PolicyConsentService;
pub use validator::ConsentValidator;
