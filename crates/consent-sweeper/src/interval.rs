//! Interval sweeper: a tokio worker ticking on a fixed period.

use crate::{Sweeper, SweeperError};
use async_trait::async_trait;
use chrono::Utc;
use consent_types::{AuditEvent, AuditEventKind, AuditStore, ConsentService, SweepStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Sweeper on a fixed interval, independent of request traffic. Delayed
/// ticks are skipped rather than replayed; a missed sweep only delays
/// storage reclamation, never correctness.
pub struct IntervalSweeper {
    service: Arc<dyn ConsentService>,
    audit_log: Option<Arc<dyn AuditStore>>,
    status: Arc<RwLock<SweepStatus>>,
}

impl IntervalSweeper {
    /// Create the sweeper and spawn its worker on `period`.
    /// If `audit_log` is provided, a Sweep audit event is appended per run.
    pub fn spawn(
        service: Arc<dyn ConsentService>,
        period: Duration,
        audit_log: Option<Arc<dyn AuditStore>>,
    ) -> Arc<Self> {
        let sweeper = Arc::new(Self {
            service,
            audit_log,
            status: Arc::new(RwLock::new(SweepStatus::default())),
        });

        let worker = Arc::clone(&sweeper);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick of a tokio interval completes immediately;
            // consume it so spawning does not trigger an instant sweep.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = worker.run_once().await {
                    tracing::warn!(error = %e, "scheduled consent sweep failed");
                }
            }
        });

        sweeper
    }

    async fn record_run(&self, result: &Result<u64, String>) {
        let now = Utc::now().to_rfc3339();
        {
            let mut status = self.status.write().await;
            status.runs += 1;
            status.last_run_at = Some(now.clone());
            match result {
                Ok(deleted) => {
                    status.total_deleted += *deleted;
                    status.last_deleted = Some(*deleted);
                    status.last_error = None;
                }
                Err(e) => {
                    status.last_error = Some(e.clone());
                }
            }
        }

        if let (Ok(deleted), Some(log)) = (result, self.audit_log.as_ref()) {
            let event = AuditEvent {
                event_id: Uuid::new_v4().to_string(),
                kind: AuditEventKind::Sweep,
                consent_id: None,
                fingerprint: String::new(),
                policy_version: String::new(),
                timestamp: now,
                detail: Some(format!("deleted={}", deleted)),
            };
            if let Err(e) = log.append(event).await {
                tracing::warn!(error = %e, "failed to append sweep audit event");
            }
        }
    }
}

#[async_trait]
impl Sweeper for IntervalSweeper {
    async fn run_once(&self) -> Result<u64, SweeperError> {
        let result = self.service.sweep().await.map_err(|e| e.to_string());
        self.record_run(&result).await;
        result.map_err(SweeperError::Other)
    }

    async fn status(&self) -> Result<SweepStatus, SweeperError> {
        Ok(self.status.read().await.clone())
    }
}
