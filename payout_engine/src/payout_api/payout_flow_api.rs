use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    alert_rules::AlertPolicy,
    db_types::{Alert, Amount, CommissionRate, NewPayoutRecord, OrganizationId, PayoutRecord, UserId},
    events::{AlertRaisedEvent, EventProducers, PayoutConfirmedEvent, PayoutOverriddenEvent},
    payout_api::payout_objects::{ExternalPayoutUpdate, OverrideRequest, SweepResult},
    reconciliation::{reconcile, ReconciliationError, ReconciliationInput},
    traits::{AlertsRecorded, OverrideResult, PayoutDatabase, PayoutEngineError},
};

/// `PayoutFlowApi` is the primary API for changing payouts: importing and updating OTA payout data, running the
/// alert policy, and the operator actions of confirming, overriding and resolving.
///
/// Status changes follow this table. Anything else fails with `IllegalStatusTransition`.
///
/// | Action                    | From                                  | To          |
/// |---------------------------|---------------------------------------|-------------|
/// | [`Self::confirm_payout`]  | `pending`, `discrepancy`              | `confirmed` |
/// | [`Self::override_payout`] | `discrepancy`                         | `confirmed` |
/// | [`Self::override_payout`] | any other                             | unchanged   |
/// | commission mismatch       | `pending`, `confirmed`, `discrepancy` | `discrepancy` |
/// | [`Self::mark_received`]   | `pending`, `confirmed`, `discrepancy` | `received`  |
///
/// Events are published only after the corresponding transaction has committed.
pub struct PayoutFlowApi<B> {
    db: B,
    producers: EventProducers,
    policy: AlertPolicy,
}

impl<B> Debug for PayoutFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PayoutFlowApi ({:?})", self.policy)
    }
}

impl<B> PayoutFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, policy: AlertPolicy::default() }
    }

    pub fn with_policy(mut self, policy: AlertPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> PayoutFlowApi<B>
where B: PayoutDatabase
{
    /// Imports a booking payout reported by an OTA integration.
    ///
    /// The commission and net payout are derived with the reconciliation rule, so the guest payment and either a
    /// commission amount or rate are required. If the OTA also reported the net payout it intends to remit, that figure
    /// is stored instead of the derived one. The alert policy runs in the same transaction as the insert, so a
    /// disagreement is committed together with its commission mismatch alert or not at all.
    pub async fn import_payout(&self, payout: NewPayoutRecord) -> Result<AlertsRecorded, PayoutEngineError> {
        if let Some(reported) = payout.reported_net_payout {
            non_negative(reported)?;
        }
        let input = ReconciliationInput {
            guest_paid_amount: payout.guest_paid_amount,
            commission_amount: payout.ota_commission_amount,
            commission_rate: payout.ota_commission_rate,
        };
        let reconciliation = reconcile(input)?;
        let org = payout.organization_id.clone();
        let recorded = self.db.insert_payout(payout, reconciliation, &self.policy, Utc::now()).await?;
        let record = &recorded.payout;
        info!(
            "🔄️📥️ Payout #{} imported for {org}: {} paid, {} commission, {} net",
            record.id,
            record.guest_paid_amount.in_currency(&record.currency),
            record.ota_commission_amount.in_currency(&record.currency),
            record.net_payout_amount.in_currency(&record.currency)
        );
        self.report_recorded(&recorded).await;
        Ok(recorded)
    }

    /// Stores corrected figures re-reported by the OTA and re-runs the alert policy on the result, atomically.
    pub async fn apply_external_update(
        &self,
        org: &OrganizationId,
        id: i64,
        update: ExternalPayoutUpdate,
    ) -> Result<AlertsRecorded, PayoutEngineError> {
        for amount in [update.guest_paid_amount, update.ota_commission_amount, update.net_payout_amount].into_iter().flatten()
        {
            non_negative(amount)?;
        }
        if let Some(rate) = update.ota_commission_rate {
            valid_rate(rate)?;
        }
        let recorded = self.db.update_payout_figures(org, id, update, &self.policy, Utc::now()).await?;
        debug!("🔄️📥️ Payout #{id} updated with OTA figures");
        self.report_recorded(&recorded).await;
        Ok(recorded)
    }

    /// Runs the alert policy against the payout now and persists the outcome.
    pub async fn evaluate_alerts(&self, org: &OrganizationId, id: i64) -> Result<AlertsRecorded, PayoutEngineError> {
        self.evaluate_alerts_at(org, id, Utc::now()).await
    }

    /// As [`Self::evaluate_alerts`], with the policy's notion of "now" supplied by the caller.
    pub async fn evaluate_alerts_at(
        &self,
        org: &OrganizationId,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<AlertsRecorded, PayoutEngineError> {
        let record = self.db.fetch_payout(org, id).await?.ok_or(PayoutEngineError::RecordNotFound(id))?;
        self.record_findings(&record, now).await
    }

    /// Runs the alert policy over every unsettled payout of every organization.
    ///
    /// A payout that changes while it is being evaluated is skipped; the next sweep will pick it up again.
    pub async fn sweep_alerts(&self) -> Result<SweepResult, PayoutEngineError> {
        self.sweep_alerts_at(Utc::now()).await
    }

    pub async fn sweep_alerts_at(&self, now: DateTime<Utc>) -> Result<SweepResult, PayoutEngineError> {
        let payouts = self.db.fetch_unsettled_payouts().await?;
        let mut result = SweepResult::default();
        for payout in &payouts {
            match self.record_findings(payout, now).await {
                Ok(recorded) => {
                    result.payouts_checked += 1;
                    result.alerts_raised += recorded.new_alerts.len();
                    if recorded.status_changed {
                        result.discrepancies_flagged += 1;
                    }
                },
                Err(e) if e.is_retryable() => {
                    debug!("🔄️🚨️ Payout #{} changed during the alert sweep. Skipping it this time: {e}", payout.id);
                },
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }

    /// Confirms the payout on behalf of `by`. Confirmation never resolves alerts.
    pub async fn confirm_payout(
        &self,
        org: &OrganizationId,
        id: i64,
        by: &UserId,
        expected_version: Option<i64>,
    ) -> Result<PayoutRecord, PayoutEngineError> {
        let payout = self.db.confirm_payout(org, id, by, expected_version).await?;
        info!("🔄️✅️ Payout #{id} confirmed by {by}");
        for emitter in &self.producers.payout_confirmed_producer {
            emitter.publish_event(PayoutConfirmedEvent::new(payout.clone())).await;
        }
        Ok(payout)
    }

    /// Replaces the payout's net payout, commission amount and commission rate with operator-supplied values.
    ///
    /// The reason is mandatory and every value must be in range, but the values need not satisfy the reconciliation
    /// identity: an override exists precisely to record what the formula cannot know. Open commission mismatch alerts
    /// for the payout are resolved as part of the same transaction.
    pub async fn override_payout(
        &self,
        org: &OrganizationId,
        id: i64,
        request: OverrideRequest,
        by: &UserId,
    ) -> Result<OverrideResult, PayoutEngineError> {
        validate_override(&request)?;
        let old_payout = self.db.fetch_payout(org, id).await?.ok_or(PayoutEngineError::RecordNotFound(id))?;
        // Pin the override to the record that was just read, so the event reports exactly what was replaced
        let request = match request.expected_version {
            Some(_) => request,
            None => request.with_expected_version(old_payout.version),
        };
        let result = self.db.override_payout(org, id, &request, by).await?;
        info!(
            "🔄️✍️ Payout #{id} manually overridden by {by} ({}). Net payout {} -> {}",
            request.override_reason.trim(),
            old_payout.net_payout_amount.in_currency(&old_payout.currency),
            result.payout.net_payout_amount.in_currency(&result.payout.currency)
        );
        for emitter in &self.producers.payout_overridden_producer {
            let event = PayoutOverriddenEvent::new(
                old_payout.clone(),
                result.payout.clone(),
                result.resolved_alerts.clone(),
            );
            emitter.publish_event(event).await;
        }
        Ok(result)
    }

    /// Resolves an open alert. Resolution notes are mandatory.
    pub async fn resolve_alert(
        &self,
        org: &OrganizationId,
        alert_id: i64,
        notes: &str,
        by: &UserId,
    ) -> Result<Alert, PayoutEngineError> {
        let notes = notes.trim();
        if notes.is_empty() {
            return Err(PayoutEngineError::MissingResolutionNotes);
        }
        let alert = self.db.resolve_alert(org, alert_id, notes, by).await?;
        info!("🔄️🚨️ Alert #{alert_id} ({}) resolved by {by}", alert.alert_type);
        Ok(alert)
    }

    /// Records the external settlement of a payout.
    pub async fn mark_received(
        &self,
        org: &OrganizationId,
        id: i64,
        expected_version: Option<i64>,
    ) -> Result<PayoutRecord, PayoutEngineError> {
        let payout = self.db.mark_payout_received(org, id, expected_version).await?;
        info!("🔄️💰️ Payout #{id} has been received");
        Ok(payout)
    }

    async fn record_findings(
        &self,
        record: &PayoutRecord,
        now: DateTime<Utc>,
    ) -> Result<AlertsRecorded, PayoutEngineError> {
        let findings = self.policy.evaluate(record, now);
        if findings.is_empty() {
            trace!("🔄️🚨️ Payout #{} is clean", record.id);
            return Ok(AlertsRecorded { payout: record.clone(), new_alerts: vec![], status_changed: false });
        }
        let recorded = self.db.record_alert_findings(record, &findings).await?;
        self.report_recorded(&recorded).await;
        Ok(recorded)
    }

    async fn report_recorded(&self, recorded: &AlertsRecorded) {
        if recorded.status_changed {
            warn!("🔄️🚨️ Payout #{} moved to {}", recorded.payout.id, recorded.payout.payout_status);
        }
        self.call_alert_raised_hook(&recorded.new_alerts).await;
    }

    async fn call_alert_raised_hook(&self, alerts: &[Alert]) {
        for emitter in &self.producers.alert_raised_producer {
            debug!("🔄️🚨️ Notifying alert raised hook subscribers");
            for alert in alerts {
                emitter.publish_event(AlertRaisedEvent::new(alert.clone())).await;
            }
        }
    }
}

fn non_negative(amount: Amount) -> Result<(), PayoutEngineError> {
    if amount.is_negative() {
        Err(ReconciliationError::NegativeAmount(amount).into())
    } else {
        Ok(())
    }
}

fn valid_rate(rate: CommissionRate) -> Result<(), PayoutEngineError> {
    if rate.is_valid() {
        Ok(())
    } else {
        Err(ReconciliationError::InvalidRate(rate).into())
    }
}

/// Checks each field of an override on its own. The reconciliation identity is deliberately not checked.
pub fn validate_override(request: &OverrideRequest) -> Result<(), PayoutEngineError> {
    if request.override_reason.trim().is_empty() {
        return Err(PayoutEngineError::MissingReason);
    }
    non_negative(request.net_payout_amount)?;
    non_negative(request.ota_commission_amount)?;
    if let Some(rate) = request.ota_commission_rate {
        valid_rate(rate)?;
    }
    Ok(())
}
