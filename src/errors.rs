//! Error types, one enum per concern. Receipt *content* problems are never
//! errors; they settle as verification outcomes. These types cover the
//! infrastructure around the receipts: keys, the signing server, storage and
//! process configuration.

use thiserror::Error;

/// Failure to produce a signed receipt.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("signing key unusable: {0}")]
    Key(String),
    #[error("claims are not serializable: {0}")]
    Claims(#[from] serde_json::Error),
    #[error("local signing failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
    #[error("signing server request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("signing server responded with status {0}")]
    Status(u16),
    #[error("signing server response malformed: {0}")]
    Response(String),
}

/// Failure to decode a presented token. Maps to the `ERROR_DECODING`
/// verification reason; the detail only ever reaches logs.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token names unknown issuer {0:?}")]
    UnknownIssuer(String),
    #[error("signature check failed: {0}")]
    Signature(#[from] jsonwebtoken::errors::Error),
    #[error("payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Failure to assemble a claim set.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("receipt misconfigured: {0}")]
    Configuration(String),
    #[error("requester is neither a reviewer nor an author of app {0}")]
    Authorization(i64),
}

/// Failure to issue (build + sign) a receipt.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// Purchase ledger access failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("connection pool unavailable")]
    Pool,
}

/// Infrastructure failure during verification. The transport reports these
/// as HTTP 500; outcomes carry everything receipt-shaped.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("re-signing an expired receipt failed: {0}")]
    Reissue(#[from] SigningError),
}

/// Reasons the status endpoint reports an unhealthy service.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("signing server is not configured")]
    SigningServerInactive,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Invalid or missing process configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{var}: {problem}")]
    Invalid { var: &'static str, problem: String },
}

/// Failure to assemble the service from its settings.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
