//! Sweeper trait: run the maintenance sweep, report its statistics.

use async_trait::async_trait;
use consent_types::SweepStatus;

#[derive(Debug, thiserror::Error)]
pub enum SweeperError {
    #[error("sweeper error: {0}")]
    Other(String),
}

/// Maintenance sweep driver. Implementations own their schedule; operators
/// can trigger a run and read run statistics.
#[async_trait]
pub trait Sweeper: Send + Sync {
    /// Run one sweep now; returns the number of records deleted.
    async fn run_once(&self) -> Result<u64, SweeperError>;

    /// Current sweep statistics.
    async fn status(&self) -> Result<SweepStatus, SweeperError>;
}
