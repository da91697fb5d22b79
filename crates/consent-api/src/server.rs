//! Axum server and routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use consent_sweeper::Sweeper;
use consent_types::{
    AuditEvent, AuditEventKind, AuditListOptions, AuditStore, CheckResponse, ClientMeta,
    ConsentService, ConsentServiceError, RejectionKind, RevokeRequest, RevokeResponse,
    VerifyOutcome, VerifyResponse, VerifySubmission,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

/// In-memory implementation of AuditStore (process lifetime only).
pub struct InMemoryAuditStore {
    events: tokio::sync::RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self {
            events: tokio::sync::RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, event: AuditEvent) -> Result<(), consent_types::AuditStoreError> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn list(
        &self,
        opts: &AuditListOptions,
    ) -> Result<Vec<AuditEvent>, consent_types::AuditStoreError> {
        let guard = self.events.read().await;
        let mut out: Vec<AuditEvent> = guard.iter().cloned().collect();
        apply_audit_list_opts(&mut out, opts);
        Ok(out)
    }
}

/// JSONL file-backed AuditStore (persists across restarts).
pub struct JsonlAuditStore {
    path: std::path::PathBuf,
    append_lock: tokio::sync::Mutex<()>,
}

impl JsonlAuditStore {
    pub fn new(path: impl AsRef<std::path::Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            append_lock: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait::async_trait]
impl AuditStore for JsonlAuditStore {
    async fn append(&self, event: AuditEvent) -> Result<(), consent_types::AuditStoreError> {
        let _guard = self.append_lock.lock().await;
        let line = serde_json::to_string(&event)
            .map_err(|e| consent_types::AuditStoreError::Other(e.to_string()))?;
        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| consent_types::AuditStoreError::Other(e.to_string()))?;
        f.write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(|e| consent_types::AuditStoreError::Other(e.to_string()))?;
        Ok(())
    }

    async fn list(
        &self,
        opts: &AuditListOptions,
    ) -> Result<Vec<AuditEvent>, consent_types::AuditStoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(consent_types::AuditStoreError::Other(e.to_string())),
        };
        let mut out: Vec<AuditEvent> = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Ok(ev) = serde_json::from_str(line) {
                out.push(ev);
            }
        }
        apply_audit_list_opts(&mut out, opts);
        Ok(out)
    }
}

fn apply_audit_list_opts(out: &mut Vec<AuditEvent>, opts: &AuditListOptions) {
    if let Some(ref fp) = opts.fingerprint {
        out.retain(|e| &e.fingerprint == fp);
    }
    if let Some(ref version) = opts.policy_version {
        out.retain(|e| &e.policy_version == version);
    }
    if let Some(ref since) = opts.since {
        out.retain(|e| e.timestamp.as_str() >= since.as_str());
    }
    out.reverse();
    let offset = opts.offset.unwrap_or(0) as usize;
    let limit = opts.limit.unwrap_or(100) as usize;
    let taken: Vec<AuditEvent> = std::mem::take(out)
        .into_iter()
        .skip(offset)
        .take(limit)
        .collect();
    *out = taken;
}

pub struct AppState {
    pub service: Arc<dyn ConsentService>,
    pub sweeper: Arc<dyn Sweeper>,
    pub audit_log: Arc<dyn AuditStore>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/consent/verify", post(handle_verify))
        .route("/consent/check", get(handle_check))
        .route("/consent/revoke", post(handle_revoke))
        .route("/consent/sweeper/status", get(handle_sweeper_status))
        .route("/consent/audit/list", get(handle_audit_list))
        .route("/health", get(handle_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, serde::Serialize)]
struct ErrorBody {
    error: String,
}

fn service_unavailable(e: ConsentServiceError) -> Response {
    tracing::error!(error = %e, "consent service unavailable");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorBody {
            error: "service unavailable".to_string(),
        }),
    )
        .into_response()
}

fn client_meta_from(headers: &HeaderMap) -> Option<ClientMeta> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    // First hop of X-Forwarded-For; the rate limiter upstream sees the same.
    let source_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string());
    if user_agent.is_none() && source_ip.is_none() {
        None
    } else {
        Some(ClientMeta {
            user_agent,
            source_ip,
        })
    }
}

fn audit_event(
    kind: AuditEventKind,
    consent_id: Option<String>,
    fingerprint: String,
    policy_version: String,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: Uuid::new_v4().to_string(),
        kind,
        consent_id,
        fingerprint,
        policy_version,
        timestamp: chrono::Utc::now().to_rfc3339(),
        detail,
    }
}

async fn push_audit(state: &AppState, event: AuditEvent) {
    if let Err(e) = state.audit_log.append(event).await {
        tracing::warn!(error = %e, "failed to append audit event");
    }
}

async fn handle_verify(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<VerifySubmission>, JsonRejection>,
) -> Response {
    let submission = match payload {
        Ok(Json(submission)) => submission,
        Err(rejection) => {
            // Mistyped or unparseable payloads are structural failures in the
            // same taxonomy, caught one layer up.
            tracing::info!(error = %rejection, "verify payload failed to parse");
            push_audit(
                &state,
                audit_event(
                    AuditEventKind::Reject,
                    None,
                    String::new(),
                    String::new(),
                    Some(RejectionKind::StructureInvalid.to_string()),
                ),
            )
            .await;
            return (
                StatusCode::BAD_REQUEST,
                Json(VerifyResponse::rejected(RejectionKind::StructureInvalid)),
            )
                .into_response();
        }
    };

    let fingerprint = submission.fingerprint.clone().unwrap_or_default();
    let policy_version = submission.policy_version.clone().unwrap_or_default();
    let client_meta = client_meta_from(&headers);

    match state.service.verify(submission, client_meta).await {
        Ok(VerifyOutcome::Accepted { id, expires_at }) => {
            push_audit(
                &state,
                audit_event(
                    AuditEventKind::Verify,
                    Some(id.clone()),
                    fingerprint,
                    policy_version,
                    None,
                ),
            )
            .await;
            (StatusCode::OK, Json(VerifyResponse::accepted(id, expires_at))).into_response()
        }
        Ok(VerifyOutcome::Rejected { kind }) => {
            push_audit(
                &state,
                audit_event(
                    AuditEventKind::Reject,
                    None,
                    fingerprint,
                    policy_version,
                    Some(kind.to_string()),
                ),
            )
            .await;
            (StatusCode::BAD_REQUEST, Json(VerifyResponse::rejected(kind))).into_response()
        }
        Err(e) => service_unavailable(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckQuery {
    pub fingerprint: String,
    pub policy_version: String,
}

async fn handle_check(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CheckQuery>,
) -> Response {
    match state.service.check(&q.fingerprint, &q.policy_version).await {
        Ok(Some(record)) => (
            StatusCode::OK,
            Json(CheckResponse {
                has_valid_consent: true,
                id: Some(record.id),
                expires_at: Some(record.expires_at),
            }),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::OK,
            Json(CheckResponse {
                has_valid_consent: false,
                id: None,
                expires_at: None,
            }),
        )
            .into_response(),
        // A storage outage denies consent by erroring (the client re-prompts);
        // it must never fail open as hasValidConsent = true.
        Err(e) => service_unavailable(e),
    }
}

async fn handle_revoke(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RevokeRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::info!(error = %rejection, "revoke payload failed to parse");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: "fingerprint and policyVersion are required".to_string(),
                }),
            )
                .into_response();
        }
    };

    match state.service.revoke(&req.fingerprint, &req.policy_version).await {
        Ok(revoked_count) => {
            push_audit(
                &state,
                audit_event(
                    AuditEventKind::Revoke,
                    None,
                    req.fingerprint.clone(),
                    req.policy_version.clone(),
                    Some(format!("revoked={}", revoked_count)),
                ),
            )
            .await;
            (StatusCode::OK, Json(RevokeResponse { revoked_count })).into_response()
        }
        Err(e) => service_unavailable(e),
    }
}

async fn handle_sweeper_status(State(state): State<Arc<AppState>>) -> Response {
    match state.sweeper.status().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditListQuery {
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub policy_version: Option<String>,
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

#[derive(Debug, serde::Serialize)]
pub struct AuditListResponse {
    pub events: Vec<AuditEvent>,
}

async fn handle_audit_list(
    State(state): State<Arc<AppState>>,
    Query(q): Query<AuditListQuery>,
) -> Response {
    let opts = AuditListOptions {
        fingerprint: q.fingerprint,
        policy_version: q.policy_version,
        since: q.since,
        limit: q.limit,
        offset: q.offset,
    };
    match state.audit_log.list(&opts).await {
        Ok(events) => (StatusCode::OK, Json(AuditListResponse { events })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn handle_health() -> &'static str {
    "ok"
}
