//! Shared client/server contract: device fingerprint and consent checksum.
//!
//! Both halves are reimplemented byte-for-byte by the browser bundle; any
//! change here is a wire-format change for deployed clients.

pub mod checksum;
pub mod fingerprint;

pub use checksum::EMBEDDED_SALT;
pub use fingerprint::DeviceSignals;
