//! End-to-end tests for the verification service: real router, real
//! signer, in-memory purchase store.

use std::{sync::Arc, time::Duration};

use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
};
use chrono::Utc;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use marketplace_receipts::{
    builder::{AppRef, ReceiptBuilder, RequesterGrants},
    domain::entities::purchase::PurchaseKind,
    service::{app_router, AppState},
    settings::{Settings, SigningSettings},
    signer::ReceiptSigner,
    util::ReceiptUtil,
    SqlitePurchaseStore,
};

const BODY_LIMIT: usize = usize::MAX;
const VERIFY_PATH: &str = "/verifier/";

struct TestKey {
    private_pem: Vec<u8>,
    public_pem: Vec<u8>,
}

static KEY: Lazy<TestKey> = Lazy::new(|| {
    let rsa = openssl::rsa::Rsa::generate(2048).expect("rsa generation");
    TestKey {
        private_pem: rsa.private_key_to_pem().expect("private pem"),
        public_pem: rsa.public_key_to_pem().expect("public pem"),
    }
});

fn signer() -> ReceiptSigner {
    ReceiptSigner::local_from_pem(&KEY.private_pem).expect("signer")
}

fn settings() -> Settings {
    Settings {
        site_url: "https://marketplace.example.com".to_string(),
        verify_url: "https://receipts.example.com/verifier/".to_string(),
        expiry_seconds: 60 * 60 * 24 * 182,
        reissue_on_expiry: false,
        signing: SigningSettings::Local {
            key_path: "unused.pem".into(),
        },
        database: None,
        bind_addr: "127.0.0.1:0".parse().expect("bind addr"),
    }
}

fn app() -> AppRef {
    AppRef {
        id: 42,
        guid: "app-guid".to_string(),
        origin: Some("app://pkg.example.com".to_string()),
    }
}

async fn state_with(settings: Settings, kind: Option<PurchaseKind>) -> AppState {
    let store = SqlitePurchaseStore::in_memory().expect("store");
    if let Some(kind) = kind {
        store
            .insert_app_purchase(42, "user-1", kind)
            .await
            .expect("seed purchase");
    }
    Arc::new(ReceiptUtil::with_parts(settings, signer(), store))
}

async fn purchase_token() -> String {
    let claims = ReceiptBuilder::new(&settings())
        .purchase(&app(), "user-1")
        .expect("claims");
    signer().sign(&claims).await.expect("token")
}

fn post(path: &str, body: String) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .body(Body::from(body))
        .expect("request")
}

fn bare(method: Method, path: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .expect("request")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn assert_service_headers(response: &axum::response::Response) {
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "content-type, x-fxpay-version"
    );
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert!(headers.contains_key(header::LAST_MODIFIED));
}

#[tokio::test]
async fn valid_receipts_verify_ok() {
    let state = state_with(settings(), Some(PurchaseKind::Purchase)).await;
    let response = app_router(state)
        .oneshot(post(VERIFY_PATH, purchase_token().await))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_service_headers(&response);
    assert_eq!(json_body(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn garbage_bodies_fail_decoding_with_status_200() {
    let state = state_with(settings(), None).await;
    let response = app_router(state)
        .oneshot(post(VERIFY_PATH, "not a receipt".to_string()))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"status": "invalid", "reason": "ERROR_DECODING"})
    );
}

#[tokio::test]
async fn unpurchased_receipts_report_no_purchase() {
    let state = state_with(settings(), None).await;
    let response = app_router(state)
        .oneshot(post(VERIFY_PATH, purchase_token().await))
        .await
        .expect("response");

    assert_eq!(
        json_body(response).await,
        json!({"status": "invalid", "reason": "NO_PURCHASE"})
    );
}

#[tokio::test]
async fn refunded_purchases_report_refunded() {
    let state = state_with(settings(), Some(PurchaseKind::Refund)).await;
    let response = app_router(state)
        .oneshot(post(VERIFY_PATH, purchase_token().await))
        .await
        .expect("response");

    assert_eq!(json_body(response).await, json!({"status": "refunded"}));
}

#[tokio::test]
async fn receipts_presented_on_the_wrong_path_are_invalid() {
    let state = state_with(settings(), Some(PurchaseKind::Purchase)).await;
    let response = app_router(state)
        .oneshot(post("/elsewhere/", purchase_token().await))
        .await
        .expect("response");

    assert_eq!(
        json_body(response).await,
        json!({"status": "invalid", "reason": "WRONG_PATH"})
    );
}

#[tokio::test]
async fn developer_receipts_are_the_wrong_type_here() {
    let state = state_with(settings(), Some(PurchaseKind::Purchase)).await;
    let claims = ReceiptBuilder::new(&settings())
        .developer(
            &app(),
            "user-1",
            RequesterGrants {
                author: true,
                ..Default::default()
            },
        )
        .expect("claims");
    let token = signer().sign(&claims).await.expect("token");
    let response = app_router(state)
        .oneshot(post(VERIFY_PATH, token))
        .await
        .expect("response");

    assert_eq!(
        json_body(response).await,
        json!({"status": "invalid", "reason": "WRONG_TYPE"})
    );
}

#[tokio::test]
async fn expired_receipts_are_reissued_when_enabled() {
    let mut reissuing = settings();
    reissuing.reissue_on_expiry = true;
    let state = state_with(reissuing, Some(PurchaseKind::Purchase)).await;

    let mut claims = ReceiptBuilder::new(&settings())
        .purchase(&app(), "user-1")
        .expect("claims");
    claims.exp = Utc::now().timestamp() - 1000;
    let token = signer().sign(&claims).await.expect("token");

    let response = app_router(state.clone())
        .oneshot(post(VERIFY_PATH, token))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    assert_eq!(value["status"], "expired");
    let reissued = value["receipt"].as_str().expect("replacement receipt");

    let response = app_router(state)
        .oneshot(post(VERIFY_PATH, reissued.to_string()))
        .await
        .expect("response");
    assert_eq!(json_body(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn expired_receipts_stay_expired_when_reissue_is_off() {
    let state = state_with(settings(), Some(PurchaseKind::Purchase)).await;
    let mut claims = ReceiptBuilder::new(&settings())
        .purchase(&app(), "user-1")
        .expect("claims");
    claims.exp = Utc::now().timestamp() - 1000;
    let token = signer().sign(&claims).await.expect("token");

    let response = app_router(state)
        .oneshot(post(VERIFY_PATH, token))
        .await
        .expect("response");
    assert_eq!(json_body(response).await, json!({"status": "expired"}));
}

#[tokio::test]
async fn preflight_answers_204_with_the_cors_headers() {
    let state = state_with(settings(), None).await;
    let response = app_router(state)
        .oneshot(bare(Method::OPTIONS, VERIFY_PATH))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_service_headers(&response);
    let bytes = body::to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("body");
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn other_methods_are_refused_but_still_cors_tagged() {
    let state = state_with(settings(), None).await;
    let response = app_router(state)
        .oneshot(bare(Method::GET, VERIFY_PATH))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_service_headers(&response);
}

#[tokio::test]
async fn status_fails_without_the_remote_signing_backend() {
    let state = state_with(settings(), None).await;
    let response = app_router(state)
        .oneshot(bare(Method::GET, "/services/status/"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let value = json_body(response).await;
    assert_eq!(value["status"], "error");
    assert!(value["detail"].as_str().is_some());
}

#[tokio::test]
async fn the_status_path_wins_over_the_method_switch() {
    let state = state_with(settings(), None).await;
    let response = app_router(state)
        .oneshot(post("/services/status/", String::new()))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["status"], "error");
}

#[tokio::test]
async fn status_reports_ok_on_the_production_configuration() {
    let key_dir = std::env::temp_dir().join(format!("receipts-issuers-{}", std::process::id()));
    std::fs::create_dir_all(&key_dir).expect("key dir");
    std::fs::write(key_dir.join("receipts.example.com.pem"), &KEY.public_pem)
        .expect("issuer key");

    let mut remote = settings();
    remote.signing = SigningSettings::Remote {
        server: "https://signer.example.com".to_string(),
        timeout: Duration::from_secs(2),
        valid_issuers: vec!["receipts.example.com".to_string()],
        issuer_key_dir: key_dir.clone(),
    };
    let util = ReceiptUtil::from_settings(remote).expect("util");

    let response = app_router(Arc::new(util))
        .oneshot(bare(Method::GET, "/services/status/"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"status": "ok"}));

    std::fs::remove_dir_all(key_dir).ok();
}
