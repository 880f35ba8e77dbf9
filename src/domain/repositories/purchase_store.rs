use async_trait::async_trait;

use crate::domain::entities::purchase::{ContributionRecord, PurchaseKind};
use crate::errors::StoreError;

/// Read access to the purchase ledger, exactly as the verifier needs it.
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    /// Kind of the most recent purchase of `app_id` by the holder of the
    /// directed `identifier`, if any.
    async fn app_purchase(
        &self,
        app_id: i64,
        identifier: &str,
    ) -> Result<Option<PurchaseKind>, StoreError>;

    /// Contribution row by id, with its linked in-app product GUID.
    async fn contribution(
        &self,
        contribution_id: i64,
    ) -> Result<Option<ContributionRecord>, StoreError>;

    /// Cheap liveness query for the status endpoint.
    async fn probe(&self) -> Result<(), StoreError>;
}
