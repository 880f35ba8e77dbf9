//! The verification state machine. Receipts are screened structurally
//! first, then checked against the purchase ledger, then against their
//! expiry. Anything wrong with the receipt itself becomes an outcome with
//! a wire reason code; only backend failures surface as errors.

use chrono::Utc;
use tracing::debug;
use url::Url;

use crate::builder;
use crate::cef;
use crate::constants::{CLOCK_SKEW_SECONDS, USER_TYPE_DIRECTED};
use crate::domain::entities::claims::DecodedReceipt;
use crate::domain::entities::flavor::ReceiptType;
use crate::domain::entities::outcome::{ExpectedStatus, InvalidReason, VerificationOutcome};
use crate::domain::entities::purchase::PurchaseKind;
use crate::domain::entities::store_data::StoreData;
use crate::domain::repositories::purchase_store::PurchaseStore;
use crate::errors::VerifyError;
use crate::settings::Settings;
use crate::signer::ReceiptSigner;

pub struct Verifier<'a, P: PurchaseStore> {
    settings: &'a Settings,
    signer: &'a ReceiptSigner,
    store: &'a P,
}

enum PurchaseDecision {
    Entitled,
    Denied(InvalidReason),
    Refunded,
}

impl<'a, P: PurchaseStore> Verifier<'a, P> {
    pub fn new(settings: &'a Settings, signer: &'a ReceiptSigner, store: &'a P) -> Self {
        Verifier {
            settings,
            signer,
            store,
        }
    }

    /// The whole stack of checks, for purchase receipts presented to the
    /// public verification service.
    pub async fn check_full(
        &self,
        raw: &str,
        request_path: &str,
    ) -> Result<VerificationOutcome, VerifyError> {
        let expected = netloc_of(&self.settings.verify_url);
        let receipt = match self.screen(raw, &[ReceiptType::Purchase], &expected, request_path) {
            Ok(receipt) => receipt,
            Err(outcome) => return Ok(outcome),
        };
        let app_id = receipt.app_id();
        match self.check_purchase(&receipt).await? {
            PurchaseDecision::Entitled => {}
            PurchaseDecision::Denied(reason) => return Ok(deny(app_id, reason)),
            PurchaseDecision::Refunded => return Ok(refunded(app_id)),
        }
        self.ok_or_expired(&receipt, app_id).await
    }

    /// Developer and reviewer receipts: no purchase backs them, and they
    /// verify on the site domain rather than the receipt domain.
    pub async fn check_without_purchase(
        &self,
        raw: &str,
        request_path: &str,
    ) -> Result<VerificationOutcome, VerifyError> {
        let allowed = [ReceiptType::Developer, ReceiptType::Reviewer];
        let expected = netloc_of(&self.settings.site_url);
        let receipt = match self.screen(raw, &allowed, &expected, request_path) {
            Ok(receipt) => receipt,
            Err(outcome) => return Ok(outcome),
        };
        let app_id = receipt.app_id();
        self.ok_or_expired(&receipt, app_id).await
    }

    /// Test receipts answer with whatever status they were minted to
    /// report, once the presentation itself holds up. The expired answer
    /// takes the real expired path, reissue included.
    pub async fn check_without_db(
        &self,
        raw: &str,
        request_path: &str,
        expected: ExpectedStatus,
    ) -> Result<VerificationOutcome, VerifyError> {
        let domain = netloc_of(&self.settings.site_url);
        let receipt = match self.screen(raw, &[ReceiptType::Test], &domain, request_path) {
            Ok(receipt) => receipt,
            Err(outcome) => return Ok(outcome),
        };
        let app_id = receipt.app_id();
        Ok(match expected {
            ExpectedStatus::Ok => VerificationOutcome::Ok,
            ExpectedStatus::Expired => return self.expired(&receipt, app_id).await,
            ExpectedStatus::Invalid => deny(app_id, InvalidReason::Unspecified),
            ExpectedStatus::Refunded => refunded(app_id),
        })
    }

    /// Structural screening shared by every mode: signature, identifier
    /// scheme, receipt type, verify URL.
    fn screen(
        &self,
        raw: &str,
        allowed: &[ReceiptType],
        expected_netloc: &str,
        request_path: &str,
    ) -> Result<DecodedReceipt, VerificationOutcome> {
        let receipt = match self.signer.decode(raw) {
            Ok(receipt) => receipt,
            Err(err) => {
                debug!(error = %err, "receipt failed to decode");
                return Err(deny(None, InvalidReason::ErrorDecoding));
            }
        };
        let app_id = receipt.app_id();
        if receipt.user_type() != Some(USER_TYPE_DIRECTED) {
            debug!("no directed identifier in receipt");
            return Err(deny(app_id, InvalidReason::NoDirectedIdentifier));
        }
        if let Some(reason) = check_type(&receipt, allowed) {
            return Err(deny(app_id, reason));
        }
        if let Some(reason) = check_url(&receipt, expected_netloc, request_path) {
            return Err(deny(app_id, reason));
        }
        Ok(receipt)
    }

    async fn check_purchase(
        &self,
        receipt: &DecodedReceipt,
    ) -> Result<PurchaseDecision, VerifyError> {
        let store_data = match receipt.storedata().and_then(StoreData::decode) {
            Some(store_data) => store_data,
            None => {
                debug!("unusable storedata in receipt");
                return Ok(PurchaseDecision::Denied(InvalidReason::WrongStoredata));
            }
        };
        match store_data.contribution_id {
            Some(contribution_id) => {
                self.check_inapp_purchase(contribution_id, store_data.inapp_id.as_deref())
                    .await
            }
            None => {
                self.check_app_purchase(store_data.app_id, receipt.user_value())
                    .await
            }
        }
    }

    /// App purchases hang off the buyer's directed identifier.
    async fn check_app_purchase(
        &self,
        app_id: i64,
        user_value: Option<&str>,
    ) -> Result<PurchaseDecision, VerifyError> {
        let identifier = match user_value {
            Some(identifier) => identifier,
            None => {
                debug!("no user in receipt");
                return Ok(PurchaseDecision::Denied(InvalidReason::NoUser));
            }
        };
        match self.store.app_purchase(app_id, identifier).await? {
            Some(kind) => Ok(decide(kind)),
            None => {
                debug!(app_id, "no purchase record for receipt");
                Ok(PurchaseDecision::Denied(InvalidReason::NoPurchase))
            }
        }
    }

    /// In-app purchases hang off the contribution row; the GUID in
    /// storedata must name the product the contribution paid for.
    async fn check_inapp_purchase(
        &self,
        contribution_id: i64,
        inapp_id: Option<&str>,
    ) -> Result<PurchaseDecision, VerifyError> {
        let record = match self.store.contribution(contribution_id).await? {
            Some(record) => record,
            None => {
                debug!(contribution_id, "no contribution record for receipt");
                return Ok(PurchaseDecision::Denied(InvalidReason::NoPurchase));
            }
        };
        // A contribution without a linked product can never match, whatever
        // its kind.
        let linked = match record.inapp_guid.as_deref() {
            Some(linked) => linked,
            None => {
                debug!(contribution_id, "contribution has no linked in-app product");
                return Ok(PurchaseDecision::Denied(InvalidReason::NoPurchase));
            }
        };
        if record.kind.is_refunded() {
            return Ok(PurchaseDecision::Refunded);
        }
        if !record.kind.is_entitling() {
            return Ok(PurchaseDecision::Denied(InvalidReason::WrongPurchase));
        }
        if inapp_id != Some(linked) {
            debug!(contribution_id, "in-app product does not match receipt");
            return Ok(PurchaseDecision::Denied(InvalidReason::NoPurchase));
        }
        Ok(PurchaseDecision::Entitled)
    }

    async fn ok_or_expired(
        &self,
        receipt: &DecodedReceipt,
        app_id: Option<i64>,
    ) -> Result<VerificationOutcome, VerifyError> {
        let now = Utc::now().timestamp();
        // Unreadable expiries count as expired, never as valid forever.
        if matches!(receipt.expiry(), Some(exp) if now + CLOCK_SKEW_SECONDS <= exp) {
            return Ok(VerificationOutcome::Ok);
        }
        self.expired(receipt, app_id).await
    }

    async fn expired(
        &self,
        receipt: &DecodedReceipt,
        app_id: Option<i64>,
    ) -> Result<VerificationOutcome, VerifyError> {
        cef::emit(cef::SIG_VERIFY, "Expired receipt", 5, app_id, None);
        if !self.settings.reissue_on_expiry {
            return Ok(VerificationOutcome::Expired { receipt: None });
        }
        cef::emit(cef::SIG_SIGN, "Expired signing request", 5, app_id, None);
        let reissued =
            builder::reissue(self.signer, receipt, self.settings.expiry_seconds).await?;
        Ok(VerificationOutcome::Expired {
            receipt: Some(reissued),
        })
    }
}

fn decide(kind: PurchaseKind) -> PurchaseDecision {
    if kind.is_refunded() {
        PurchaseDecision::Refunded
    } else if kind.is_entitling() {
        PurchaseDecision::Entitled
    } else {
        debug!(?kind, "purchase record does not entitle");
        PurchaseDecision::Denied(InvalidReason::WrongPurchase)
    }
}

fn check_type(receipt: &DecodedReceipt, allowed: &[ReceiptType]) -> Option<InvalidReason> {
    match receipt.typ().and_then(ReceiptType::parse) {
        Some(typ) if allowed.contains(&typ) => None,
        _ => {
            debug!(typ = receipt.typ().unwrap_or(""), "wrong receipt type");
            Some(InvalidReason::WrongType)
        }
    }
}

/// The verify URL must sit on `expected_netloc` and its path must be the
/// one the receipt was actually presented to. Domain outranks path.
fn check_url(
    receipt: &DecodedReceipt,
    expected_netloc: &str,
    request_path: &str,
) -> Option<InvalidReason> {
    let parsed = match Url::parse(receipt.verify_url().unwrap_or_default()) {
        Ok(parsed) => parsed,
        Err(_) => {
            debug!("unparseable verify URL in receipt");
            return Some(InvalidReason::WrongDomain);
        }
    };
    if netloc(&parsed).as_deref() != Some(expected_netloc) {
        debug!("receipt had invalid domain");
        return Some(InvalidReason::WrongDomain);
    }
    if parsed.path() != request_path {
        debug!("receipt had the wrong path");
        return Some(InvalidReason::WrongPath);
    }
    None
}

/// `host:port`, the port only when it is not the scheme default.
fn netloc(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn netloc_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| netloc(&parsed))
        .unwrap_or_default()
}

fn deny(app_id: Option<i64>, reason: InvalidReason) -> VerificationOutcome {
    cef::emit(cef::SIG_VERIFY, "Invalid receipt", 5, app_id, Some(reason.code()));
    VerificationOutcome::Invalid { reason }
}

fn refunded(app_id: Option<i64>) -> VerificationOutcome {
    cef::emit(cef::SIG_VERIFY, "Refunded receipt", 5, app_id, None);
    VerificationOutcome::Refunded
}
