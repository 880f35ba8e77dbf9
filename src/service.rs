//! The standalone verification service: one CORS-friendly dispatcher in
//! front of the verifier. Receipts carry their verify path inside the
//! token, so every path accepts a POST and the path check happens inside
//! the verifier, not in the router.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::Response,
    Router,
};
use chrono::Utc;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::constants::{CORS_HEADERS, CORS_METHODS, CORS_ORIGIN};
use crate::data::repositories::sqlite_purchase_store::SqlitePurchaseStore;
use crate::util::ReceiptUtil;

pub type AppState = Arc<ReceiptUtil<SqlitePurchaseStore>>;

const STATUS_PATH: &str = "/services/status/";

pub fn app_router(state: AppState) -> Router {
    Router::new().fallback(dispatch).with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "receipt verifier listening");
    axum::serve(listener, app_router(state)).await
}

/// The status path wins over the method switch: monitors may probe it
/// with any method.
async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    if uri.path() == STATUS_PATH {
        return status(&state).await;
    }
    match method {
        Method::POST => verify(&state, uri.path(), &body).await,
        Method::OPTIONS => respond(StatusCode::NO_CONTENT, String::new()),
        _ => respond(StatusCode::METHOD_NOT_ALLOWED, String::new()),
    }
}

async fn verify(state: &AppState, path: &str, body: &[u8]) -> Response {
    let raw = String::from_utf8_lossy(body);
    match state.verify_full(&raw, path).await {
        Ok(outcome) => match serde_json::to_string(&outcome) {
            Ok(body) => respond(StatusCode::OK, body),
            Err(err) => {
                error!(error = %err, "failed to encode verification outcome");
                respond(StatusCode::INTERNAL_SERVER_ERROR, String::new())
            }
        },
        Err(err) => {
            error!(error = %err, "verification backend failure");
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "verification backend failure"}).to_string(),
            )
        }
    }
}

async fn status(state: &AppState) -> Response {
    match state.status_probe().await {
        Ok(()) => respond(StatusCode::OK, json!({"status": "ok"}).to_string()),
        Err(err) => respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"status": "error", "detail": err.to_string()}).to_string(),
        ),
    }
}

/// Every response, the preflight and errors included, carries the CORS and
/// caching headers installed clients rely on.
fn respond(status: StatusCode, body: String) -> Response {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(CORS_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(CORS_HEADERS),
    );
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Ok(last_modified) = HeaderValue::from_str(&http_date()) {
        headers.insert(header::LAST_MODIFIED, last_modified);
    }
    response
}

fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
