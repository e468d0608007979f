//! Read-only access to payouts, alerts and analytics.
use std::fmt::Debug;

use log::trace;

use crate::{
    db_types::{Alert, OrganizationId, PayoutRecord},
    payout_api::payout_objects::{AlertQueryFilter, PayoutAnalytics, PayoutQueryFilter},
    traits::{PayoutEngineError, PayoutManagement},
};

pub struct PayoutQueryApi<B> {
    db: B,
}

impl<B: Debug> Debug for PayoutQueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PayoutQueryApi ({:?})", self.db)
    }
}

impl<B> PayoutQueryApi<B>
where B: PayoutManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn payouts(
        &self,
        org: &OrganizationId,
        filter: PayoutQueryFilter,
    ) -> Result<Vec<PayoutRecord>, PayoutEngineError> {
        trace!("🔍️ Searching payouts for {org}. {filter}");
        filter.validate()?;
        self.db.search_payouts(org, filter).await
    }

    /// Fetches a single payout. Payouts belonging to another organization are reported as not found.
    pub async fn payout(&self, org: &OrganizationId, id: i64) -> Result<PayoutRecord, PayoutEngineError> {
        self.db.fetch_payout(org, id).await?.ok_or(PayoutEngineError::RecordNotFound(id))
    }

    pub async fn alerts(&self, org: &OrganizationId, filter: AlertQueryFilter) -> Result<Vec<Alert>, PayoutEngineError> {
        trace!("🔍️ Searching alerts for {org}. {filter}");
        self.db.search_alerts(org, filter).await
    }

    pub async fn alert(&self, org: &OrganizationId, id: i64) -> Result<Alert, PayoutEngineError> {
        self.db.fetch_alert(org, id).await?.ok_or(PayoutEngineError::AlertNotFound(id))
    }

    pub async fn analytics(&self, org: &OrganizationId) -> Result<PayoutAnalytics, PayoutEngineError> {
        self.db.fetch_payout_analytics(org).await
    }
}
