use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    alert_rules::{AlertFindings, AlertPolicy},
    db_types::{Alert, NewPayoutRecord, OrganizationId, PayoutRecord, PayoutStatus, UserId},
    payout_api::payout_objects::{ExternalPayoutUpdate, OverrideRequest},
    reconciliation::{Reconciliation, ReconciliationError},
    traits::{data_objects::AlertsRecorded, OverrideResult, PayoutManagement},
};

/// This trait defines the write side of a payout reconciliation backend.
///
/// Every method is a single atomic unit of work. Methods that modify a payout are guarded by the record's `version`:
/// if `expected_version` is given and does not match the stored version, or if another writer commits between the
/// read and the write, the call fails with [`PayoutEngineError::ConcurrentModification`] and nothing is written.
#[allow(async_fn_in_trait)]
pub trait PayoutDatabase: Clone + PayoutManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a freshly imported payout in the `pending` state, with the money fields from `reconciliation`, then
    /// evaluates `policy` against the stored record at `now` and persists the findings in the same transaction.
    ///
    /// The net payout stored is the one reported by the OTA, if any, and the reconciled one otherwise.
    /// Fails with [`PayoutEngineError::PayoutAlreadyExists`] if the organization already has a payout for the same
    /// platform and reservation code.
    async fn insert_payout(
        &self,
        payout: NewPayoutRecord,
        reconciliation: Reconciliation,
        policy: &AlertPolicy,
        now: DateTime<Utc>,
    ) -> Result<AlertsRecorded, PayoutEngineError>;

    /// Overwrites the money fields and checkout date of a payout with figures re-reported by the OTA, then evaluates
    /// `policy` against the result. The figures, any new alerts and a move to `discrepancy` commit together.
    async fn update_payout_figures(
        &self,
        org: &OrganizationId,
        id: i64,
        update: ExternalPayoutUpdate,
        policy: &AlertPolicy,
        now: DateTime<Utc>,
    ) -> Result<AlertsRecorded, PayoutEngineError>;

    /// Persists the result of an alert policy evaluation of `evaluated`, in a single transaction:
    /// * inserts one alert per finding, silently skipping findings for which an open alert of the same type already
    ///   exists for the payout,
    /// * moves the payout to the status implied by the findings, if it differs from the current one.
    ///
    /// Fails with [`PayoutEngineError::ConcurrentModification`] if the payout changed after it was evaluated.
    async fn record_alert_findings(
        &self,
        evaluated: &PayoutRecord,
        findings: &AlertFindings,
    ) -> Result<AlertsRecorded, PayoutEngineError>;

    /// Marks the payout as `confirmed` by `by`. Only legal from `pending` and `discrepancy`.
    async fn confirm_payout(
        &self,
        org: &OrganizationId,
        id: i64,
        by: &UserId,
        expected_version: Option<i64>,
    ) -> Result<PayoutRecord, PayoutEngineError>;

    /// Applies a manual override and, in the same transaction, resolves every open `commission_mismatch` alert of the
    /// payout on behalf of `by`.
    ///
    /// The request is assumed to have been validated already.
    async fn override_payout(
        &self,
        org: &OrganizationId,
        id: i64,
        request: &OverrideRequest,
        by: &UserId,
    ) -> Result<OverrideResult, PayoutEngineError>;

    /// Resolves an open alert. Resolved alerts are immutable, so resolving one twice fails with
    /// [`PayoutEngineError::AlertAlreadyResolved`].
    async fn resolve_alert(
        &self,
        org: &OrganizationId,
        alert_id: i64,
        notes: &str,
        by: &UserId,
    ) -> Result<Alert, PayoutEngineError>;

    /// Records the settlement of a payout. `received` is terminal, so this fails for payouts that have already
    /// settled.
    async fn mark_payout_received(
        &self,
        org: &OrganizationId,
        id: i64,
        expected_version: Option<i64>,
    ) -> Result<PayoutRecord, PayoutEngineError>;

    /// Fetches every payout, across all organizations, that has not settled yet.
    async fn fetch_unsettled_payouts(&self) -> Result<Vec<PayoutRecord>, PayoutEngineError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayoutEngineError {
    #[error("{0}")]
    Reconciliation(#[from] ReconciliationError),
    #[error("An override reason is required")]
    MissingReason,
    #[error("Resolution notes are required to resolve an alert")]
    MissingResolutionNotes,
    #[error("The requested payout record {0} does not exist")]
    RecordNotFound(i64),
    #[error("The requested alert {0} does not exist")]
    AlertNotFound(i64),
    #[error("Alert {0} has already been resolved")]
    AlertAlreadyResolved(i64),
    #[error("Payout record {id} was modified concurrently. Expected version {expected}, but found {found}")]
    ConcurrentModification { id: i64, expected: i64, found: i64 },
    #[error("Cannot {action} a payout that is {from}")]
    IllegalStatusTransition { from: PayoutStatus, action: String },
    #[error("A payout for reservation {0} already exists")]
    PayoutAlreadyExists(String),
    #[error("Invalid query. {0}")]
    InvalidQuery(String),
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
}

impl PayoutEngineError {
    pub fn illegal_transition<S: Into<String>>(from: PayoutStatus, action: S) -> Self {
        Self::IllegalStatusTransition { from, action: action.into() }
    }

    /// Only lost optimistic-lock races are worth retrying with fresh data.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}

impl From<sqlx::Error> for PayoutEngineError {
    fn from(e: sqlx::Error) -> Self {
        PayoutEngineError::DatabaseError(e.to_string())
    }
}
