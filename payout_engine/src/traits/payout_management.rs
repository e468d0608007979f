use crate::{
    db_types::{Alert, OrganizationId, PayoutRecord},
    payout_api::payout_objects::{AlertQueryFilter, PayoutAnalytics, PayoutQueryFilter},
    traits::PayoutEngineError,
};

/// Read-only queries over an organization's payouts and alerts.
///
/// Every query is scoped to `org`. Records belonging to other organizations are never returned, even when asked for
/// by id.
#[allow(async_fn_in_trait)]
pub trait PayoutManagement {
    async fn fetch_payout(&self, org: &OrganizationId, id: i64) -> Result<Option<PayoutRecord>, PayoutEngineError>;

    /// Fetches the payouts matching the filter, oldest first.
    async fn search_payouts(
        &self,
        org: &OrganizationId,
        query: PayoutQueryFilter,
    ) -> Result<Vec<PayoutRecord>, PayoutEngineError>;

    async fn fetch_alert(&self, org: &OrganizationId, id: i64) -> Result<Option<Alert>, PayoutEngineError>;

    /// Fetches the alerts matching the filter, newest first.
    async fn search_alerts(&self, org: &OrganizationId, query: AlertQueryFilter)
        -> Result<Vec<Alert>, PayoutEngineError>;

    async fn fetch_payout_analytics(&self, org: &OrganizationId) -> Result<PayoutAnalytics, PayoutEngineError>;
}
