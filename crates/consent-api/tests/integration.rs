//! Integration tests: verify/check/revoke contract, rejection taxonomy,
//! expiry with a simulated clock, sweep, audit listing.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use consent_api::server::{self, AppState, InMemoryAuditStore};
use consent_checksum::checksum;
use consent_checksum::fingerprint::{derive_fingerprint, DeviceSignals};
use consent_core::{ConsentConfig, ConsentValidator, ManualClock, PolicyConsentService};
use consent_store::InMemoryConsentStore;
use consent_sweeper::{IntervalSweeper, Sweeper};
use consent_types::{AuditStore, ConsentService};
use http_body_util::BodyExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

const T0: i64 = 1_700_000_000_000;
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

struct TestApp {
    app: axum::Router,
    clock: Arc<ManualClock>,
    sweeper: Arc<IntervalSweeper>,
    salt: String,
}

fn test_app() -> TestApp {
    let config = ConsentConfig::new("2.0");
    let salt = config.salt.clone();
    let clock = Arc::new(ManualClock::new(T0));
    let store = InMemoryConsentStore::new(config.validity_period_ms);
    let service: Arc<dyn ConsentService> = Arc::new(PolicyConsentService::with_clock(
        store,
        ConsentValidator::new(config),
        clock.clone(),
    ));
    let audit_log: Arc<dyn AuditStore> = Arc::new(InMemoryAuditStore::new());
    // Hour-long period: only explicit run_once calls sweep during a test.
    let sweeper = IntervalSweeper::spawn(
        Arc::clone(&service),
        Duration::from_secs(3600),
        Some(Arc::clone(&audit_log)),
    );
    let state = Arc::new(AppState {
        service,
        sweeper: sweeper.clone(),
        audit_log,
    });
    TestApp {
        app: server::router(state),
        clock,
        sweeper,
        salt,
    }
}

fn verify_body(ts: i64, version: &str, fingerprint: &str, salt: &str) -> serde_json::Value {
    json!({
        "submittedAt": ts,
        "policyVersion": version,
        "fingerprint": fingerprint,
        "checksum": checksum::compute(ts, version, fingerprint, salt),
    })
}

async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("user-agent", "integration-test")
        .body(Body::from(body.to_string()))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let j = serde_json::from_slice(&bytes).unwrap();
    (status, j)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let j = serde_json::from_slice(&bytes).unwrap();
    (status, j)
}

#[tokio::test]
async fn verify_then_check_round_trip() {
    let t = test_app();
    // The full client flow: derive the fingerprint from device signals,
    // checksum the tuple, then submit.
    let fingerprint = derive_fingerprint(&DeviceSignals {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0".to_string(),
        language: "en-US".to_string(),
        screen_resolution: "1920x1080".to_string(),
        timezone_offset_min: -120,
        canvas_hash: "c4nv4s".to_string(),
        hardware_concurrency: 8,
        touch_support: false,
    });
    let (status, j) = post_json(
        &t.app,
        "/consent/verify",
        verify_body(T0, "2.0", &fingerprint, &t.salt),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(j["accepted"], true);
    assert_eq!(j["expiresAt"], T0 + 30 * DAY_MS);
    let id = j["id"].as_str().unwrap().to_string();

    let uri = format!(
        "/consent/check?fingerprint={}&policyVersion=2.0",
        fingerprint
    );
    let (status, first) = get_json(&t.app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["hasValidConsent"], true);
    assert_eq!(first["id"], id.as_str());

    // Pure read: an immediate repeat is identical.
    let (_, second) = get_json(&t.app, &uri).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn missing_field_is_structure_invalid() {
    let t = test_app();
    let (status, j) = post_json(
        &t.app,
        "/consent/verify",
        json!({ "submittedAt": T0, "policyVersion": "2.0", "fingerprint": "abc" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(j["accepted"], false);
    assert_eq!(j["errorKind"], "STRUCTURE_INVALID");
}

#[tokio::test]
async fn mistyped_field_is_structure_invalid() {
    let t = test_app();
    let mut body = verify_body(T0, "2.0", "abc", &t.salt);
    body["submittedAt"] = json!("now");
    let (status, j) = post_json(&t.app, "/consent/verify", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(j["errorKind"], "STRUCTURE_INVALID");
}

#[tokio::test]
async fn stale_timestamp_is_rejected_despite_valid_checksum() {
    let t = test_app();
    let (status, j) = post_json(
        &t.app,
        "/consent/verify",
        verify_body(T0 - 60_000, "2.0", "abc", &t.salt),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(j["errorKind"], "TIMESTAMP_OUT_OF_WINDOW");
}

#[tokio::test]
async fn tampered_field_is_checksum_mismatch() {
    let t = test_app();
    let mut body = verify_body(T0, "2.0", "abc", &t.salt);
    body["fingerprint"] = json!("abd");
    let (status, j) = post_json(&t.app, "/consent/verify", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(j["errorKind"], "CHECKSUM_MISMATCH");
}

#[tokio::test]
async fn inactive_version_is_version_mismatch() {
    let t = test_app();
    // Checksum is honest for version 1.0, so only the semantic stage fires.
    let (status, j) = post_json(
        &t.app,
        "/consent/verify",
        verify_body(T0, "1.0", "abc", &t.salt),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(j["errorKind"], "VERSION_MISMATCH");
}

#[tokio::test]
async fn revoke_then_check_false_then_revoke_zero() {
    let t = test_app();
    post_json(
        &t.app,
        "/consent/verify",
        verify_body(T0, "2.0", "abc", &t.salt),
    )
    .await;

    let (status, j) = post_json(
        &t.app,
        "/consent/revoke",
        json!({ "fingerprint": "abc", "policyVersion": "2.0" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(j["revokedCount"], 1);

    let (_, j) = get_json(&t.app, "/consent/check?fingerprint=abc&policyVersion=2.0").await;
    assert_eq!(j["hasValidConsent"], false);
    assert!(j.get("id").is_none());

    let (_, j) = post_json(
        &t.app,
        "/consent/revoke",
        json!({ "fingerprint": "abc", "policyVersion": "2.0" }),
    )
    .await;
    assert_eq!(j["revokedCount"], 0);
}

#[tokio::test]
async fn expiry_sweep_and_reconsent() {
    let t = test_app();
    post_json(
        &t.app,
        "/consent/verify",
        verify_body(T0, "2.0", "abc", &t.salt),
    )
    .await;

    // 31 days later the record has lapsed.
    t.clock.advance(31 * DAY_MS);
    let (_, j) = get_json(&t.app, "/consent/check?fingerprint=abc&policyVersion=2.0").await;
    assert_eq!(j["hasValidConsent"], false);

    // Replaying the identical payload fails freshness.
    let (status, j) = post_json(
        &t.app,
        "/consent/verify",
        verify_body(T0, "2.0", "abc", &t.salt),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(j["errorKind"], "TIMESTAMP_OUT_OF_WINDOW");

    // The sweep physically removes the lapsed record.
    assert_eq!(t.sweeper.run_once().await.unwrap(), 1);
    let (_, j) = get_json(&t.app, "/consent/sweeper/status").await;
    assert_eq!(j["runs"], 1);
    assert_eq!(j["totalDeleted"], 1);

    // A fresh submission with the current timestamp is accepted anew.
    let now = T0 + 31 * DAY_MS;
    let (status, j) = post_json(
        &t.app,
        "/consent/verify",
        verify_body(now, "2.0", "abc", &t.salt),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(j["accepted"], true);

    let (_, j) = get_json(&t.app, "/consent/check?fingerprint=abc&policyVersion=2.0").await;
    assert_eq!(j["hasValidConsent"], true);
}

#[tokio::test]
async fn audit_trail_records_decisions() {
    let t = test_app();
    post_json(
        &t.app,
        "/consent/verify",
        verify_body(T0, "2.0", "abc", &t.salt),
    )
    .await;
    post_json(
        &t.app,
        "/consent/verify",
        verify_body(T0 - 60_000, "2.0", "def", &t.salt),
    )
    .await;
    post_json(
        &t.app,
        "/consent/revoke",
        json!({ "fingerprint": "abc", "policyVersion": "2.0" }),
    )
    .await;

    let (status, j) = get_json(&t.app, "/consent/audit/list").await;
    assert_eq!(status, StatusCode::OK);
    let events = j["events"].as_array().unwrap();
    let kinds: Vec<&str> = events.iter().map(|e| e["kind"].as_str().unwrap()).collect();
    assert!(kinds.contains(&"verify"));
    assert!(kinds.contains(&"reject"));
    assert!(kinds.contains(&"revoke"));

    // The rejection carries its kind and the submitted fingerprint.
    let reject = events.iter().find(|e| e["kind"] == "reject").unwrap();
    assert_eq!(reject["detail"], "TIMESTAMP_OUT_OF_WINDOW");
    assert_eq!(reject["fingerprint"], "def");

    let (_, j) = get_json(&t.app, "/consent/audit/list?fingerprint=abc").await;
    let events = j["events"].as_array().unwrap();
    assert!(!events.is_empty());
    assert!(events.iter().all(|e| e["fingerprint"] == "abc"));
}

#[tokio::test]
async fn health_endpoint() {
    let t = test_app();
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let res = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ok");
}
