/// Purchase ledger entry kinds, integer-coded in storage. Codes outside the
/// known set fold into `Other`, which entitles nobody and refunds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseKind {
    Voluntary,
    Purchase,
    Refund,
    Chargeback,
    Pending,
    NoCharge,
    Other,
}

impl PurchaseKind {
    pub fn code(&self) -> i64 {
        match self {
            PurchaseKind::Voluntary => 0,
            PurchaseKind::Purchase => 1,
            PurchaseKind::Refund => 2,
            PurchaseKind::Chargeback => 3,
            PurchaseKind::Pending => 4,
            PurchaseKind::NoCharge => 7,
            PurchaseKind::Other => 99,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            0 => PurchaseKind::Voluntary,
            1 => PurchaseKind::Purchase,
            2 => PurchaseKind::Refund,
            3 => PurchaseKind::Chargeback,
            4 => PurchaseKind::Pending,
            7 => PurchaseKind::NoCharge,
            _ => PurchaseKind::Other,
        }
    }

    /// Kinds that settle verification as refunded.
    pub fn is_refunded(&self) -> bool {
        matches!(self, PurchaseKind::Refund | PurchaseKind::Chargeback)
    }

    /// Kinds that entitle the holder to the product.
    pub fn is_entitling(&self) -> bool {
        matches!(self, PurchaseKind::Purchase | PurchaseKind::NoCharge)
    }
}

/// Contribution row backing an in-app receipt, with the GUID of the linked
/// in-app product when there is one.
#[derive(Debug, Clone)]
pub struct ContributionRecord {
    pub kind: PurchaseKind,
    pub inapp_guid: Option<String>,
}
