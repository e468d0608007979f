//! Alert policy for booking payouts.
//!
//! [`AlertPolicy::evaluate`] looks at a single payout and reports every condition that deserves an alert. It never
//! touches storage. Persisting the findings, and skipping those that duplicate an alert that is still open, is the
//! job of [`crate::traits::PayoutDatabase::record_alert_findings`].
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{alert_types, AlertSeverity, Amount, NewAlert, PayoutRecord, PayoutStatus},
    reconciliation::{reconcile, ReconciliationInput},
};

pub const DEFAULT_MISSING_CONFIRMATION_HOURS: i64 = 72;
pub const DEFAULT_MISMATCH_TOLERANCE: Amount = Amount::from_minor_units(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    /// How long a payout may stay `pending` after checkout (or import, if the checkout date is unknown).
    pub missing_confirmation_after: Duration,
    /// The largest difference between the stored and recomputed net payout that is put down to rounding.
    pub mismatch_tolerance: Amount,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            missing_confirmation_after: Duration::hours(DEFAULT_MISSING_CONFIRMATION_HOURS),
            mismatch_tolerance: DEFAULT_MISMATCH_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertFinding {
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFindings {
    pub findings: Vec<AlertFinding>,
    /// True if the payout should move to `discrepancy`.
    pub mark_discrepancy: bool,
}

impl AlertFindings {
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn contains(&self, alert_type: &str) -> bool {
        self.findings.iter().any(|f| f.alert_type == alert_type)
    }

    /// The alerts to insert for `record`.
    pub fn to_new_alerts(&self, record: &PayoutRecord) -> Vec<NewAlert> {
        self.findings
            .iter()
            .map(|f| NewAlert {
                organization_id: record.organization_id.clone(),
                booking_payout_id: Some(record.id),
                alert_type: f.alert_type.clone(),
                alert_message: f.message.clone(),
                severity: f.severity,
            })
            .collect()
    }

    /// The status the payout should end up in once the findings are applied.
    pub fn resulting_status(&self, current: PayoutStatus) -> PayoutStatus {
        if self.mark_discrepancy {
            current.after_mismatch()
        } else {
            current
        }
    }
}

impl AlertPolicy {
    pub fn new(missing_confirmation_after: Duration, mismatch_tolerance: Amount) -> Self {
        Self { missing_confirmation_after, mismatch_tolerance }
    }

    pub fn evaluate(&self, record: &PayoutRecord, now: DateTime<Utc>) -> AlertFindings {
        let mut result = AlertFindings::default();
        if let Some(finding) = self.missing_confirmation(record, now) {
            result.findings.push(finding);
        }
        if let Some(finding) = self.commission_mismatch(record) {
            result.findings.push(finding);
            result.mark_discrepancy = true;
        }
        if let Some(finding) = unexplained_override(record) {
            result.findings.push(finding);
        }
        result
    }

    fn missing_confirmation(&self, record: &PayoutRecord, now: DateTime<Utc>) -> Option<AlertFinding> {
        if record.payout_status != PayoutStatus::Pending {
            return None;
        }
        let reference = record.confirmation_reference_time();
        let age = now - reference;
        if age <= self.missing_confirmation_after {
            return None;
        }
        Some(AlertFinding {
            alert_type: alert_types::MISSING_CONFIRMATION.to_string(),
            severity: AlertSeverity::Medium,
            message: format!(
                "Payout for reservation {} on {} has not been confirmed {} hours after {}",
                record.reservation_code,
                record.ota_platform,
                age.num_hours(),
                if record.check_out_date.is_some() { "checkout" } else { "import" }
            ),
        })
    }

    fn commission_mismatch(&self, record: &PayoutRecord) -> Option<AlertFinding> {
        if record.manual_override {
            return None;
        }
        let input = match record.ota_commission_rate {
            Some(rate) => ReconciliationInput::from_rate(record.guest_paid_amount, rate),
            None => ReconciliationInput::from_commission(record.guest_paid_amount, record.ota_commission_amount),
        };
        let stored = record.net_payout_amount;
        let message = match reconcile(input) {
            Ok(expected) if expected.net_payout_amount.abs_diff(stored) <= self.mismatch_tolerance => return None,
            Ok(expected) => format!(
                "Net payout for reservation {} is {} but the commission implies {}",
                record.reservation_code,
                stored.in_currency(&record.currency),
                expected.net_payout_amount.in_currency(&record.currency)
            ),
            Err(e) => format!(
                "Net payout for reservation {} ({}) cannot be reconciled: {e}",
                record.reservation_code,
                stored.in_currency(&record.currency)
            ),
        };
        Some(AlertFinding {
            alert_type: alert_types::COMMISSION_MISMATCH.to_string(),
            severity: AlertSeverity::High,
            message,
        })
    }
}

fn unexplained_override(record: &PayoutRecord) -> Option<AlertFinding> {
    if !record.manual_override || record.has_override_reason() {
        return None;
    }
    let by = record.override_by.as_ref().map(|u| u.as_str()).unwrap_or("an unknown user");
    Some(AlertFinding {
        alert_type: alert_types::UNEXPLAINED_OVERRIDE.to_string(),
        severity: AlertSeverity::Critical,
        message: format!(
            "Payout for reservation {} was manually overridden by {by} without a reason",
            record.reservation_code
        ),
    })
}
