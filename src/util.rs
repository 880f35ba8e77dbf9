use crate::{
    builder::{self, AppRef, ContributionRef, ReceiptBuilder, RequesterGrants},
    cef,
    data::repositories::sqlite_purchase_store::SqlitePurchaseStore,
    domain::{
        entities::{
            claims::DecodedReceipt,
            outcome::{ExpectedStatus, VerificationOutcome},
        },
        repositories::purchase_store::PurchaseStore,
    },
    errors::{DecodeError, IssueError, SetupError, SigningError, StatusError, VerifyError},
    settings::Settings,
    signer::ReceiptSigner,
    verifier::Verifier,
};

/// One place that wires settings, signer and purchase store together. The
/// verification service and library callers both go through this.
pub struct ReceiptUtil<P: PurchaseStore> {
    settings: Settings,
    signer: ReceiptSigner,
    store: P,
}

impl<P: PurchaseStore> ReceiptUtil<P> {
    pub fn with_parts(settings: Settings, signer: ReceiptSigner, store: P) -> Self {
        ReceiptUtil {
            settings,
            signer,
            store,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub async fn issue_purchase(
        &self,
        app: &AppRef,
        user_value: &str,
    ) -> Result<String, IssueError> {
        let claims = ReceiptBuilder::new(&self.settings).purchase(app, user_value)?;
        cef::emit(cef::SIG_SIGN, "Receipt signing", 5, Some(app.id), None);
        Ok(self.signer.sign(&claims).await?)
    }

    pub async fn issue_developer(
        &self,
        app: &AppRef,
        user_value: &str,
        grants: RequesterGrants,
    ) -> Result<String, IssueError> {
        let claims = ReceiptBuilder::new(&self.settings).developer(app, user_value, grants)?;
        cef::emit(
            cef::SIG_SIGN,
            "Receipt signing for developer",
            5,
            Some(app.id),
            None,
        );
        Ok(self.signer.sign(&claims).await?)
    }

    pub async fn issue_reviewer(
        &self,
        app: &AppRef,
        user_value: &str,
        grants: RequesterGrants,
    ) -> Result<String, IssueError> {
        let claims = ReceiptBuilder::new(&self.settings).reviewer(app, user_value, grants)?;
        cef::emit(
            cef::SIG_SIGN,
            "Receipt signing for reviewer",
            5,
            Some(app.id),
            None,
        );
        Ok(self.signer.sign(&claims).await?)
    }

    pub async fn issue_inapp(
        &self,
        app: &AppRef,
        user_value: &str,
        contribution: Option<&ContributionRef>,
    ) -> Result<String, IssueError> {
        let claims = ReceiptBuilder::new(&self.settings).inapp(app, user_value, contribution)?;
        cef::emit(cef::SIG_SIGN, "Receipt signing", 5, Some(app.id), None);
        Ok(self.signer.sign(&claims).await?)
    }

    pub async fn issue_test(&self, expected: ExpectedStatus) -> Result<String, SigningError> {
        let claims = ReceiptBuilder::new(&self.settings).test(expected);
        cef::emit(cef::SIG_SIGN, "Test receipt signing", 5, None, None);
        self.signer.sign(&claims).await
    }

    /// Decode a presented token with signature verification; expiry is not
    /// checked here, so expired receipts can still be fed to [`reissue`].
    ///
    /// [`reissue`]: ReceiptUtil::reissue
    pub fn decode(&self, raw: &str) -> Result<DecodedReceipt, DecodeError> {
        self.signer.decode(raw)
    }

    /// Re-sign an already decoded receipt with fresh timestamps.
    pub async fn reissue(&self, receipt: &DecodedReceipt) -> Result<String, SigningError> {
        cef::emit(
            cef::SIG_SIGN,
            "Receipt reissue signing",
            5,
            receipt.app_id(),
            None,
        );
        builder::reissue(&self.signer, receipt, self.settings.expiry_seconds).await
    }

    pub async fn verify_full(
        &self,
        raw: &str,
        request_path: &str,
    ) -> Result<VerificationOutcome, VerifyError> {
        Verifier::new(&self.settings, &self.signer, &self.store)
            .check_full(raw, request_path)
            .await
    }

    pub async fn verify_without_purchase(
        &self,
        raw: &str,
        request_path: &str,
    ) -> Result<VerificationOutcome, VerifyError> {
        Verifier::new(&self.settings, &self.signer, &self.store)
            .check_without_purchase(raw, request_path)
            .await
    }

    pub async fn verify_without_db(
        &self,
        raw: &str,
        request_path: &str,
        expected: ExpectedStatus,
    ) -> Result<VerificationOutcome, VerifyError> {
        Verifier::new(&self.settings, &self.signer, &self.store)
            .check_without_db(raw, request_path, expected)
            .await
    }

    /// Health of the production configuration: remote signing must be
    /// active and the purchase store answering.
    pub async fn status_probe(&self) -> Result<(), StatusError> {
        if !self.settings.remote_signing() {
            return Err(StatusError::SigningServerInactive);
        }
        self.store.probe().await?;
        Ok(())
    }
}

impl ReceiptUtil<SqlitePurchaseStore> {
    /// Wires the configured signing backend and purchase database.
    pub fn from_settings(settings: Settings) -> Result<Self, SetupError> {
        let signer = ReceiptSigner::from_settings(&settings.signing)?;
        let store = match &settings.database {
            Some(path) => SqlitePurchaseStore::open(path)?,
            None => SqlitePurchaseStore::in_memory()?,
        };
        Ok(ReceiptUtil {
            settings,
            signer,
            store,
        })
    }
}
