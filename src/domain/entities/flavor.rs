use crate::constants::{TYPE_DEVELOPER, TYPE_PURCHASE, TYPE_REVIEWER, TYPE_TEST};

/// What a receipt is issued for. Issue-side policy (expiry window, verify
/// URL, authorization) hangs off the flavor; the wire only ever sees the
/// [`ReceiptType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptFlavor {
    Purchase,
    Developer,
    Reviewer,
    Test,
    /// In-app purchases ride on the `purchase-receipt` type with extra
    /// storedata fields.
    InApp,
}

impl ReceiptFlavor {
    pub fn wire_type(&self) -> ReceiptType {
        match self {
            ReceiptFlavor::Purchase | ReceiptFlavor::InApp => ReceiptType::Purchase,
            ReceiptFlavor::Developer => ReceiptType::Developer,
            ReceiptFlavor::Reviewer => ReceiptType::Reviewer,
            ReceiptFlavor::Test => ReceiptType::Test,
        }
    }
}

/// The `typ` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptType {
    Purchase,
    Developer,
    Reviewer,
    Test,
}

impl ReceiptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptType::Purchase => TYPE_PURCHASE,
            ReceiptType::Developer => TYPE_DEVELOPER,
            ReceiptType::Reviewer => TYPE_REVIEWER,
            ReceiptType::Test => TYPE_TEST,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            TYPE_PURCHASE => Some(ReceiptType::Purchase),
            TYPE_DEVELOPER => Some(ReceiptType::Developer),
            TYPE_REVIEWER => Some(ReceiptType::Reviewer),
            TYPE_TEST => Some(ReceiptType::Test),
            _ => None,
        }
    }
}
