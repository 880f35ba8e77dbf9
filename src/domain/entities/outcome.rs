use serde::Serialize;

/// Machine-readable grounds on which a receipt is judged invalid. The wire
/// codes are load-bearing: installed clients switch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvalidReason {
    ErrorDecoding,
    NoDirectedIdentifier,
    WrongType,
    WrongDomain,
    WrongPath,
    WrongStoredata,
    NoPurchase,
    WrongPurchase,
    NoUser,
    /// Test receipts asked to report `invalid` carry an empty reason.
    #[serde(rename = "")]
    Unspecified,
}

impl InvalidReason {
    pub fn code(&self) -> &'static str {
        match self {
            InvalidReason::ErrorDecoding => "ERROR_DECODING",
            InvalidReason::NoDirectedIdentifier => "NO_DIRECTED_IDENTIFIER",
            InvalidReason::WrongType => "WRONG_TYPE",
            InvalidReason::WrongDomain => "WRONG_DOMAIN",
            InvalidReason::WrongPath => "WRONG_PATH",
            InvalidReason::WrongStoredata => "WRONG_STOREDATA",
            InvalidReason::NoPurchase => "NO_PURCHASE",
            InvalidReason::WrongPurchase => "WRONG_PURCHASE",
            InvalidReason::NoUser => "NO_USER",
            InvalidReason::Unspecified => "",
        }
    }
}

/// What the verifier concluded about a receipt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerificationOutcome {
    Ok,
    Expired {
        /// Replacement receipt, present when reissue-on-expiry is enabled.
        #[serde(skip_serializing_if = "Option::is_none")]
        receipt: Option<String>,
    },
    Invalid {
        reason: InvalidReason,
    },
    Refunded,
}

/// Status a test receipt's verifier is asked to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedStatus {
    Ok,
    Expired,
    Invalid,
    Refunded,
}

impl ExpectedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpectedStatus::Ok => "ok",
            ExpectedStatus::Expired => "expired",
            ExpectedStatus::Invalid => "invalid",
            ExpectedStatus::Refunded => "refunded",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ok" => Some(ExpectedStatus::Ok),
            "expired" => Some(ExpectedStatus::Expired),
            "invalid" => Some(ExpectedStatus::Invalid),
            "refunded" => Some(ExpectedStatus::Refunded),
            _ => None,
        }
    }
}
