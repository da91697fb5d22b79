//! Consent verification API server: /consent/verify, /consent/check, /consent/revoke.

use consent_api::server::{self, AppState, InMemoryAuditStore, JsonlAuditStore};
use consent_core::{ConsentConfig, ConsentValidator, PolicyConsentService};
use consent_store::{InMemoryConsentStore, SqliteConsentStore};
use consent_sweeper::IntervalSweeper;
use consent_types::{AuditStore, ConsentService};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ConsentConfig::from_env();
    tracing::info!(
        active_version = %config.active_version,
        freshness_window_ms = config.freshness_window_ms,
        validity_period_ms = config.validity_period_ms,
        "consent config loaded"
    );

    let service: Arc<dyn ConsentService> = match std::env::var("CONSENT_DB") {
        Ok(path) => {
            tracing::info!(path = %path, "using sqlite consent store");
            let store = SqliteConsentStore::new(&path, config.validity_period_ms)?;
            Arc::new(PolicyConsentService::new(
                store,
                ConsentValidator::new(config),
            ))
        }
        Err(_) => {
            let store = InMemoryConsentStore::new(config.validity_period_ms);
            Arc::new(PolicyConsentService::new(
                store,
                ConsentValidator::new(config),
            ))
        }
    };

    let audit_log: Arc<dyn AuditStore> = match std::env::var("CONSENT_AUDIT_LOG") {
        Ok(path) => Arc::new(JsonlAuditStore::new(path)),
        Err(_) => Arc::new(InMemoryAuditStore::new()),
    };

    let sweep_interval = std::env::var("CONSENT_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
    let sweeper = IntervalSweeper::spawn(
        Arc::clone(&service),
        Duration::from_secs(sweep_interval),
        Some(Arc::clone(&audit_log)),
    );

    let state = Arc::new(AppState {
        service,
        sweeper,
        audit_log,
    });
    let app = server::router(state);
    let addr: SocketAddr = std::env::var("CONSENT_LISTEN")
        .unwrap_or_else(|_| "0.0.0.0:8032".to_string())
        .parse()?;
    tracing::info!("consent API listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;
    Ok(())
}
