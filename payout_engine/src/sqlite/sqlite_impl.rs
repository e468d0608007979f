//! `SqliteDatabase` is a concrete implementation of a payout engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
//!
//! Writes follow the same optimistic pattern throughout: read the current record, check it against the caller's
//! expectations, then open a transaction whose first statement is a compare-and-swap `UPDATE` on the version that was
//! read. Side effects on alerts run inside the same transaction.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqliteConnection, SqlitePool};

use super::db::{alerts, analytics, db_url, new_pool, payouts};
use crate::{
    alert_rules::{AlertFindings, AlertPolicy},
    db_types::{alert_types, Alert, NewPayoutRecord, OrganizationId, PayoutRecord, UserId},
    payout_api::payout_objects::{
        AlertQueryFilter,
        ExternalPayoutUpdate,
        OverrideRequest,
        PayoutAnalytics,
        PayoutQueryFilter,
    },
    reconciliation::Reconciliation,
    traits::{AlertsRecorded, OverrideResult, PayoutDatabase, PayoutEngineError, PayoutManagement},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl PayoutManagement for SqliteDatabase {
    async fn fetch_payout(&self, org: &OrganizationId, id: i64) -> Result<Option<PayoutRecord>, PayoutEngineError> {
        let mut conn = self.pool.acquire().await?;
        let record = payouts::fetch_payout(org, id, &mut conn).await?;
        Ok(record)
    }

    async fn search_payouts(
        &self,
        org: &OrganizationId,
        query: PayoutQueryFilter,
    ) -> Result<Vec<PayoutRecord>, PayoutEngineError> {
        query.validate()?;
        let mut conn = self.pool.acquire().await?;
        let records = payouts::search_payouts(org, query, &mut conn).await?;
        Ok(records)
    }

    async fn fetch_alert(&self, org: &OrganizationId, id: i64) -> Result<Option<Alert>, PayoutEngineError> {
        let mut conn = self.pool.acquire().await?;
        let alert = alerts::fetch_alert(org, id, &mut conn).await?;
        Ok(alert)
    }

    async fn search_alerts(
        &self,
        org: &OrganizationId,
        query: AlertQueryFilter,
    ) -> Result<Vec<Alert>, PayoutEngineError> {
        let mut conn = self.pool.acquire().await?;
        let alerts = alerts::search_alerts(org, query, &mut conn).await?;
        Ok(alerts)
    }

    async fn fetch_payout_analytics(&self, org: &OrganizationId) -> Result<PayoutAnalytics, PayoutEngineError> {
        let mut conn = self.pool.acquire().await?;
        analytics::payout_analytics(org, &mut conn).await
    }
}

impl PayoutDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_payout(
        &self,
        payout: NewPayoutRecord,
        reconciliation: Reconciliation,
        policy: &AlertPolicy,
        now: DateTime<Utc>,
    ) -> Result<AlertsRecorded, PayoutEngineError> {
        let mut tx = self.pool.begin().await?;
        let record = payouts::insert_payout(payout, reconciliation, now, &mut tx).await?;
        let findings = policy.evaluate(&record, now);
        let recorded = persist_findings(&record, &findings, now, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Payout #{} for reservation {} on {} has been saved with {} alerts",
            record.id,
            record.reservation_code,
            record.ota_platform,
            recorded.new_alerts.len()
        );
        Ok(recorded)
    }

    async fn update_payout_figures(
        &self,
        org: &OrganizationId,
        id: i64,
        update: ExternalPayoutUpdate,
        policy: &AlertPolicy,
        now: DateTime<Utc>,
    ) -> Result<AlertsRecorded, PayoutEngineError> {
        let current = self.fetch_current(org, id, update.expected_version).await?;
        let updated = update.apply_to(&current);
        let mut tx = self.pool.begin().await?;
        let record = match payouts::update_figures(&current, &updated, now, &mut tx).await? {
            Some(r) => r,
            None => return Err(lost_update(id, current.version, &mut tx).await),
        };
        let findings = policy.evaluate(&record, now);
        let recorded = persist_findings(&record, &findings, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payout #{id} figures updated from OTA data. Now at version {}", recorded.payout.version);
        Ok(recorded)
    }

    async fn record_alert_findings(
        &self,
        evaluated: &PayoutRecord,
        findings: &AlertFindings,
    ) -> Result<AlertsRecorded, PayoutEngineError> {
        let mut tx = self.pool.begin().await?;
        let recorded = persist_findings(evaluated, findings, Utc::now(), &mut tx).await?;
        if !recorded.status_changed {
            // Nothing was swapped, so make sure the findings still describe the stored record.
            let found = payouts::fetch_version(evaluated.id, &mut tx)
                .await?
                .ok_or(PayoutEngineError::RecordNotFound(evaluated.id))?;
            if found != evaluated.version {
                return Err(PayoutEngineError::ConcurrentModification {
                    id: evaluated.id,
                    expected: evaluated.version,
                    found,
                });
            }
        }
        tx.commit().await?;
        Ok(recorded)
    }

    async fn confirm_payout(
        &self,
        org: &OrganizationId,
        id: i64,
        by: &UserId,
        expected_version: Option<i64>,
    ) -> Result<PayoutRecord, PayoutEngineError> {
        let current = self.fetch_current(org, id, expected_version).await?;
        if current.payout_status.confirm().is_none() {
            return Err(PayoutEngineError::illegal_transition(current.payout_status, "confirm"));
        }
        let mut tx = self.pool.begin().await?;
        let record = match payouts::confirm(&current, by, Utc::now(), &mut tx).await? {
            Some(r) => r,
            None => return Err(lost_update(id, current.version, &mut tx).await),
        };
        tx.commit().await?;
        debug!("🗃️ Payout #{id} confirmed by {by}");
        Ok(record)
    }

    async fn override_payout(
        &self,
        org: &OrganizationId,
        id: i64,
        request: &OverrideRequest,
        by: &UserId,
    ) -> Result<OverrideResult, PayoutEngineError> {
        let current = self.fetch_current(org, id, request.expected_version).await?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let payout = match payouts::apply_override(&current, request, by, now, &mut tx).await? {
            Some(p) => p,
            None => return Err(lost_update(id, current.version, &mut tx).await),
        };
        let notes = format!("Resolved by manual override: {}", request.override_reason.trim());
        let resolved_alerts = alerts::resolve_open_alerts_for_payout(
            payout.id,
            alert_types::COMMISSION_MISMATCH,
            &notes,
            by,
            now,
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        debug!(
            "🗃️ Payout #{id} overridden by {by}. Status {} -> {}. {} mismatch alerts resolved",
            current.payout_status,
            payout.payout_status,
            resolved_alerts.len()
        );
        Ok(OverrideResult { payout, resolved_alerts })
    }

    async fn resolve_alert(
        &self,
        org: &OrganizationId,
        alert_id: i64,
        notes: &str,
        by: &UserId,
    ) -> Result<Alert, PayoutEngineError> {
        let mut tx = self.pool.begin().await?;
        match alerts::resolve_alert(org, alert_id, notes, by, Utc::now(), &mut tx).await? {
            Some(alert) => {
                tx.commit().await?;
                debug!("🗃️ Alert #{alert_id} resolved by {by}");
                Ok(alert)
            },
            None => match alerts::fetch_alert(org, alert_id, &mut tx).await? {
                Some(_) => Err(PayoutEngineError::AlertAlreadyResolved(alert_id)),
                None => Err(PayoutEngineError::AlertNotFound(alert_id)),
            },
        }
    }

    async fn mark_payout_received(
        &self,
        org: &OrganizationId,
        id: i64,
        expected_version: Option<i64>,
    ) -> Result<PayoutRecord, PayoutEngineError> {
        let current = self.fetch_current(org, id, expected_version).await?;
        let status = current
            .payout_status
            .settle()
            .ok_or_else(|| PayoutEngineError::illegal_transition(current.payout_status, "settle"))?;
        let mut tx = self.pool.begin().await?;
        let record = match payouts::update_status(&current, status, Utc::now(), &mut tx).await? {
            Some(r) => r,
            None => return Err(lost_update(id, current.version, &mut tx).await),
        };
        tx.commit().await?;
        Ok(record)
    }

    async fn fetch_unsettled_payouts(&self) -> Result<Vec<PayoutRecord>, PayoutEngineError> {
        let mut conn = self.pool.acquire().await?;
        let records = payouts::fetch_unsettled_payouts(&mut conn).await?;
        Ok(records)
    }
}

/// Inserts an alert per finding, skipping types that are already open for the payout, and applies the status the
/// findings call for. `evaluated` must be the version of the record the caller read or wrote on `conn`.
async fn persist_findings(
    evaluated: &PayoutRecord,
    findings: &AlertFindings,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<AlertsRecorded, PayoutEngineError> {
    let target_status = findings.resulting_status(evaluated.payout_status);
    let (payout, status_changed) = if target_status == evaluated.payout_status {
        (evaluated.clone(), false)
    } else {
        match payouts::update_status(evaluated, target_status, now, &mut *conn).await? {
            Some(p) => (p, true),
            None => return Err(lost_update(evaluated.id, evaluated.version, conn).await),
        }
    };
    let mut new_alerts = Vec::with_capacity(findings.findings.len());
    for alert in findings.to_new_alerts(evaluated) {
        if let Some(a) = alerts::insert_alert_if_new(alert, now, &mut *conn).await? {
            new_alerts.push(a);
        }
    }
    Ok(AlertsRecorded { payout, new_alerts, status_changed })
}

/// Explains a failed compare-and-swap on payout `id`: either somebody else bumped the version, or the record is gone.
async fn lost_update(id: i64, expected: i64, conn: &mut SqliteConnection) -> PayoutEngineError {
    match payouts::fetch_version(id, conn).await {
        Ok(Some(found)) => {
            warn!("🗃️ Payout #{id} was modified concurrently (expected version {expected}, found {found})");
            PayoutEngineError::ConcurrentModification { id, expected, found }
        },
        Ok(None) => PayoutEngineError::RecordNotFound(id),
        Err(e) => e.into(),
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Fetches the payout, failing if it does not exist for this organization or if its version differs from the one
    /// the caller expects.
    async fn fetch_current(
        &self,
        org: &OrganizationId,
        id: i64,
        expected_version: Option<i64>,
    ) -> Result<PayoutRecord, PayoutEngineError> {
        let mut conn = self.pool.acquire().await?;
        let current = payouts::fetch_payout(org, id, &mut conn).await?.ok_or(PayoutEngineError::RecordNotFound(id))?;
        match expected_version {
            Some(expected) if expected != current.version => {
                Err(PayoutEngineError::ConcurrentModification { id, expected, found: current.version })
            },
            _ => Ok(current),
        }
    }
}
