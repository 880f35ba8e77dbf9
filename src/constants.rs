//! Wire-level constants shared between the issue and verify paths.

/// `typ` values a receipt may carry.
pub(crate) const TYPE_PURCHASE: &str = "purchase-receipt";
pub(crate) const TYPE_DEVELOPER: &str = "developer-receipt";
pub(crate) const TYPE_REVIEWER: &str = "reviewer-receipt";
pub(crate) const TYPE_TEST: &str = "test-receipt";

/// The only user identity scheme receipts support.
pub(crate) const USER_TYPE_DIRECTED: &str = "directed-identifier";

/// Directed identifier carried by test receipts.
pub(crate) const TEST_USER_VALUE: &str = "none";

/// Separates the issuer id from the JWT in remotely signed tokens.
pub(crate) const REMOTE_TOKEN_SEPARATOR: char = '~';

/// Path on the signing server that accepts claim sets to sign.
pub(crate) const SIGNING_PATH: &str = "/1.0/sign";

/// Default lifetime of purchase receipts: 182 days.
pub(crate) const DEFAULT_EXPIRY_SECONDS: i64 = 60 * 60 * 24 * 182;

/// Lifetime of developer, reviewer and test receipts.
pub(crate) const SHORT_EXPIRY_SECONDS: i64 = 60 * 60 * 24;

/// Clock skew tolerated when comparing `exp` against the current time.
pub(crate) const CLOCK_SKEW_SECONDS: i64 = 10;

// CORS surface advertised on every response of the verification service.
pub(crate) const CORS_ORIGIN: &str = "*";
pub(crate) const CORS_METHODS: &str = "POST";
pub(crate) const CORS_HEADERS: &str = "content-type, x-fxpay-version";

// Identity fields of CEF audit log lines.
pub(crate) const CEF_VENDOR: &str = "Marketplace";
pub(crate) const CEF_PRODUCT: &str = "receipts";
