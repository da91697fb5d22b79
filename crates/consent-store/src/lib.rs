//! ConsentStore implementations: in-memory and SQLite-backed.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use consent_types::{ConsentStore, ConsentStoreError};
pub use memory::InMemoryConsentStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteConsentStore;
