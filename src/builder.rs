//! Claim-set construction for every receipt flavor, plus reissue of
//! existing receipts.

use chrono::Utc;
use serde_json::{Map, Value};

use crate::constants::{SHORT_EXPIRY_SECONDS, TEST_USER_VALUE};
use crate::domain::entities::claims::{
    DecodedReceipt, ReceiptClaims, ReceiptProduct, ReceiptUser,
};
use crate::domain::entities::flavor::ReceiptFlavor;
use crate::domain::entities::outcome::ExpectedStatus;
use crate::domain::entities::store_data::StoreData;
use crate::errors::{BuildError, SigningError};
use crate::settings::Settings;
use crate::signer::ReceiptSigner;

/// App a receipt is issued for.
#[derive(Debug, Clone)]
pub struct AppRef {
    pub id: i64,
    pub guid: String,
    /// `app://` origin for packaged apps; hosted apps may not have one.
    pub origin: Option<String>,
}

/// Contribution backing an in-app purchase receipt.
#[derive(Debug, Clone)]
pub struct ContributionRef {
    pub id: i64,
    pub inapp_guid: Option<String>,
}

/// Caller-supplied proof of the requester's relationship to the app.
/// Developer and reviewer receipts are only issued to one or the other.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequesterGrants {
    pub reviewer: bool,
    pub author: bool,
}

pub struct ReceiptBuilder<'a> {
    settings: &'a Settings,
}

impl<'a> ReceiptBuilder<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        ReceiptBuilder { settings }
    }

    /// Receipt for a completed app purchase.
    pub fn purchase(&self, app: &AppRef, user_value: &str) -> Result<ReceiptClaims, BuildError> {
        let user = directed_user(user_value)?;
        Ok(self.assemble(
            ReceiptFlavor::Purchase,
            self.product_url(app),
            StoreData::for_app(app.id),
            user,
            self.settings.verify_url.clone(),
            self.settings.expiry_seconds,
        ))
    }

    /// Developer receipt: short-lived, verified on the site domain.
    pub fn developer(
        &self,
        app: &AppRef,
        user_value: &str,
        grants: RequesterGrants,
    ) -> Result<ReceiptClaims, BuildError> {
        self.short_lived(ReceiptFlavor::Developer, app, user_value, grants)
    }

    /// Reviewer receipt: same policy as developer receipts, its own type.
    pub fn reviewer(
        &self,
        app: &AppRef,
        user_value: &str,
        grants: RequesterGrants,
    ) -> Result<ReceiptClaims, BuildError> {
        self.short_lived(ReceiptFlavor::Reviewer, app, user_value, grants)
    }

    /// In-app purchase receipt. Rides the purchase-receipt type, with the
    /// backing contribution and product GUID in storedata.
    pub fn inapp(
        &self,
        app: &AppRef,
        user_value: &str,
        contribution: Option<&ContributionRef>,
    ) -> Result<ReceiptClaims, BuildError> {
        let contribution = contribution.ok_or_else(|| {
            BuildError::Configuration("in-app receipts need a backing contribution".to_string())
        })?;
        let guid = contribution.inapp_guid.as_deref().ok_or_else(|| {
            BuildError::Configuration(format!(
                "contribution {} has no linked in-app product",
                contribution.id
            ))
        })?;
        let user = directed_user(user_value)?;
        Ok(self.assemble(
            ReceiptFlavor::InApp,
            self.product_url(app),
            StoreData::for_inapp(app.id, contribution.id, guid.to_string()),
            user,
            self.settings.verify_url.clone(),
            self.settings.expiry_seconds,
        ))
    }

    /// Throwaway receipt whose verifier reports `expected` for any
    /// structurally sound presentation.
    pub fn test(&self, expected: ExpectedStatus) -> ReceiptClaims {
        let now = Utc::now().timestamp();
        ReceiptClaims {
            typ: ReceiptFlavor::Test.wire_type().as_str().to_string(),
            product: ReceiptProduct {
                url: self.settings.site_url.clone(),
                storedata: StoreData::for_app(0).encode(),
            },
            user: ReceiptUser::directed(TEST_USER_VALUE),
            iss: self.settings.site_url.clone(),
            iat: now,
            nbf: now,
            exp: now + SHORT_EXPIRY_SECONDS,
            verify: self.settings.test_verify_url(expected.as_str()),
            reissue: None,
            detail: None,
        }
    }

    fn short_lived(
        &self,
        flavor: ReceiptFlavor,
        app: &AppRef,
        user_value: &str,
        grants: RequesterGrants,
    ) -> Result<ReceiptClaims, BuildError> {
        if !(grants.reviewer || grants.author) {
            return Err(BuildError::Authorization(app.id));
        }
        let user = directed_user(user_value)?;
        Ok(self.assemble(
            flavor,
            self.product_url(app),
            StoreData::for_app(app.id),
            user,
            self.settings.app_verify_url(&app.guid),
            SHORT_EXPIRY_SECONDS,
        ))
    }

    fn assemble(
        &self,
        flavor: ReceiptFlavor,
        url: String,
        store_data: StoreData,
        user: ReceiptUser,
        verify: String,
        expiry_seconds: i64,
    ) -> ReceiptClaims {
        let now = Utc::now().timestamp();
        let reissue = self.settings.reissue_url();
        ReceiptClaims {
            typ: flavor.wire_type().as_str().to_string(),
            product: ReceiptProduct {
                url,
                storedata: store_data.encode(),
            },
            user,
            iss: self.settings.site_url.clone(),
            iat: now,
            nbf: now,
            exp: now + expiry_seconds,
            verify,
            reissue: Some(reissue.clone()),
            // No detail pages exist; point detail at the reissue endpoint.
            detail: Some(reissue),
        }
    }

    /// The origin when the app has one, else the configured site URL, both
    /// verbatim. [`normalize_origin`] is the explicit normalization rule
    /// for callers that need one.
    fn product_url(&self, app: &AppRef) -> String {
        app.origin
            .clone()
            .unwrap_or_else(|| self.settings.site_url.clone())
    }
}

/// Every non-test receipt names its requester by directed identifier.
fn directed_user(value: &str) -> Result<ReceiptUser, BuildError> {
    if value.is_empty() {
        return Err(BuildError::Configuration(
            "receipt user identifier is empty".to_string(),
        ));
    }
    Ok(ReceiptUser::directed(value))
}

/// Strips a single trailing slash. App origins are stored without one;
/// configured site URLs often carry one.
pub fn normalize_origin(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

/// Refreshed copy of a claim set: `exp` moves to now + `expiry_seconds`,
/// `iat` and `nbf` to now. Everything else is carried verbatim.
pub fn refresh_timestamps(fields: &Map<String, Value>, expiry_seconds: i64) -> Map<String, Value> {
    let now = Utc::now().timestamp();
    let mut refreshed = fields.clone();
    refreshed.insert("exp".to_string(), Value::from(now + expiry_seconds));
    refreshed.insert("iat".to_string(), Value::from(now));
    refreshed.insert("nbf".to_string(), Value::from(now));
    refreshed
}

/// Re-signs an already verified receipt with fresh timestamps.
pub async fn reissue(
    signer: &ReceiptSigner,
    receipt: &DecodedReceipt,
    expiry_seconds: i64,
) -> Result<String, SigningError> {
    let refreshed = refresh_timestamps(receipt.fields(), expiry_seconds);
    signer.sign_value(&Value::Object(refreshed)).await
}
