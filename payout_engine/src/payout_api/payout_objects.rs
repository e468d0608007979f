use std::fmt::Display;

use chrono::{DateTime, Utc};
use payout_common::helpers::div_round_half_even;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{AlertSeverity, Amount, CommissionRate, Currency, OtaPlatform, PayoutRecord, PayoutStatus},
    traits::PayoutEngineError,
};

//--------------------------------------  PayoutQueryFilter   ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PayoutQueryFilter {
    pub platform: Option<OtaPlatform>,
    pub status: Option<PayoutStatus>,
    pub property_id: Option<String>,
    pub currency: Option<Currency>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl PayoutQueryFilter {
    pub fn with_platform(mut self, platform: OtaPlatform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_status(mut self, status: PayoutStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_property_id<S: Into<String>>(mut self, property_id: S) -> Self {
        self.property_id = Some(property_id.into());
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn since<T>(mut self, since: T) -> Result<Self, PayoutEngineError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = since.try_into().map_err(|e| PayoutEngineError::InvalidQuery(e.to_string()))?;
        self.since = Some(dt);
        Ok(self)
    }

    pub fn until<T>(mut self, until: T) -> Result<Self, PayoutEngineError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = until.try_into().map_err(|e| PayoutEngineError::InvalidQuery(e.to_string()))?;
        self.until = Some(dt);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.platform.is_none() &&
            self.status.is_none() &&
            self.property_id.is_none() &&
            self.currency.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }

    /// Checks that the filter can match anything at all.
    pub fn validate(&self) -> Result<(), PayoutEngineError> {
        match (self.since, self.until) {
            (Some(since), Some(until)) if since > until => {
                Err(PayoutEngineError::InvalidQuery(format!("since ({since}) is later than until ({until})")))
            },
            _ => Ok(()),
        }
    }
}

impl Display for PayoutQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(platform) = &self.platform {
            write!(f, "platform: {platform}. ")?;
        }
        if let Some(status) = &self.status {
            write!(f, "status: {status}. ")?;
        }
        if let Some(property_id) = &self.property_id {
            write!(f, "property_id: {property_id}. ")?;
        }
        if let Some(currency) = &self.currency {
            write!(f, "currency: {currency}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        Ok(())
    }
}

//--------------------------------------   AlertQueryFilter   ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertQueryFilter {
    /// Only return alerts that have not been resolved yet.
    #[serde(default)]
    pub open_only: bool,
    pub payout_id: Option<i64>,
    pub alert_type: Option<String>,
    pub severity: Option<AlertSeverity>,
}

impl AlertQueryFilter {
    pub fn open() -> Self {
        Self { open_only: true, ..Default::default() }
    }

    pub fn for_payout(mut self, payout_id: i64) -> Self {
        self.payout_id = Some(payout_id);
        self
    }

    pub fn with_alert_type<S: Into<String>>(mut self, alert_type: S) -> Self {
        self.alert_type = Some(alert_type.into());
        self
    }

    pub fn with_severity(mut self, severity: AlertSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.open_only && self.payout_id.is_none() && self.alert_type.is_none() && self.severity.is_none()
    }
}

impl Display for AlertQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters.");
        }
        if self.open_only {
            write!(f, "open only. ")?;
        }
        if let Some(id) = self.payout_id {
            write!(f, "payout: #{id}. ")?;
        }
        if let Some(t) = &self.alert_type {
            write!(f, "type: {t}. ")?;
        }
        if let Some(s) = &self.severity {
            write!(f, "severity: {s}. ")?;
        }
        Ok(())
    }
}

//--------------------------------------    OverrideRequest   ---------------------------------------------------------
/// An operator's manual correction of a payout's money fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRequest {
    pub net_payout_amount: Amount,
    pub ota_commission_amount: Amount,
    /// The corrected rate. Left out, the stored rate is kept.
    pub ota_commission_rate: Option<CommissionRate>,
    pub override_reason: String,
    /// The record version the operator was looking at. The override fails if the record has changed since.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

impl OverrideRequest {
    pub fn new<S: Into<String>>(net_payout_amount: Amount, ota_commission_amount: Amount, reason: S) -> Self {
        Self {
            net_payout_amount,
            ota_commission_amount,
            ota_commission_rate: None,
            override_reason: reason.into(),
            expected_version: None,
        }
    }

    pub fn with_rate(mut self, rate: CommissionRate) -> Self {
        self.ota_commission_rate = Some(rate);
        self
    }

    pub fn with_expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

//-------------------------------------- ExternalPayoutUpdate ---------------------------------------------------------
/// Corrected figures for a payout, as re-reported by the OTA. Fields left as `None` keep their stored value.
///
/// The figures are stored as reported. Checking them against the reconciliation rule is left to the alert policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPayoutUpdate {
    pub guest_paid_amount: Option<Amount>,
    pub ota_commission_amount: Option<Amount>,
    pub ota_commission_rate: Option<CommissionRate>,
    pub net_payout_amount: Option<Amount>,
    pub check_out_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

impl ExternalPayoutUpdate {
    pub fn with_guest_paid(mut self, amount: Amount) -> Self {
        self.guest_paid_amount = Some(amount);
        self
    }

    pub fn with_commission_amount(mut self, amount: Amount) -> Self {
        self.ota_commission_amount = Some(amount);
        self
    }

    pub fn with_commission_rate(mut self, rate: CommissionRate) -> Self {
        self.ota_commission_rate = Some(rate);
        self
    }

    pub fn with_net_payout(mut self, amount: Amount) -> Self {
        self.net_payout_amount = Some(amount);
        self
    }

    pub fn with_check_out_date(mut self, check_out: DateTime<Utc>) -> Self {
        self.check_out_date = Some(check_out);
        self
    }

    pub fn with_expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }

    /// The record as it would look with this update applied. Only the reported fields change.
    pub fn apply_to(&self, record: &PayoutRecord) -> PayoutRecord {
        let mut updated = record.clone();
        if let Some(amount) = self.guest_paid_amount {
            updated.guest_paid_amount = amount;
        }
        if let Some(amount) = self.ota_commission_amount {
            updated.ota_commission_amount = amount;
        }
        if let Some(rate) = self.ota_commission_rate {
            updated.ota_commission_rate = Some(rate);
        }
        if let Some(amount) = self.net_payout_amount {
            updated.net_payout_amount = amount;
        }
        if let Some(check_out) = self.check_out_date {
            updated.check_out_date = Some(check_out);
        }
        updated
    }

    pub fn is_empty(&self) -> bool {
        self.guest_paid_amount.is_none() &&
            self.ota_commission_amount.is_none() &&
            self.ota_commission_rate.is_none() &&
            self.net_payout_amount.is_none() &&
            self.check_out_date.is_none()
    }
}

//--------------------------------------      SweepResult     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepResult {
    pub payouts_checked: usize,
    pub alerts_raised: usize,
    pub discrepancies_flagged: usize,
}

impl Display for SweepResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} payouts checked, {} alerts raised, {} discrepancies flagged",
            self.payouts_checked, self.alerts_raised, self.discrepancies_flagged
        )
    }
}

//--------------------------------------       Analytics      ---------------------------------------------------------
/// Sums and averages of the money fields over a group of payouts sharing one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutTotals {
    pub currency: Currency,
    pub count: i64,
    pub total_guest_paid: Amount,
    pub total_commission: Amount,
    pub total_net_payout: Amount,
    pub average_guest_paid: Amount,
    pub average_commission: Amount,
    pub average_net_payout: Amount,
}

impl PayoutTotals {
    /// Builds the totals from a group count and sums. Averages are rounded half-to-even to the nearest minor unit.
    pub fn from_sums(currency: Currency, count: i64, guest_paid: Amount, commission: Amount, net_payout: Amount) -> Self {
        let average = |sum: Amount| {
            if count == 0 {
                Amount::ZERO
            } else {
                // the average of i64 values always fits in an i64
                Amount::from(div_round_half_even(i128::from(sum.value()), i128::from(count)) as i64)
            }
        };
        Self {
            average_guest_paid: average(guest_paid),
            average_commission: average(commission),
            average_net_payout: average(net_payout),
            currency,
            count,
            total_guest_paid: guest_paid,
            total_commission: commission,
            total_net_payout: net_payout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformTotals {
    pub platform: OtaPlatform,
    #[serde(flatten)]
    pub totals: PayoutTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotals {
    /// `YYYY-MM`, taken from the checkout date, or the import date when the checkout date is unknown.
    pub month: String,
    #[serde(flatten)]
    pub totals: PayoutTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTotals {
    pub status: PayoutStatus,
    #[serde(flatten)]
    pub totals: PayoutTotals,
}

/// Aggregate views over an organization's payouts. Amounts in different currencies are never added together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutAnalytics {
    pub by_platform: Vec<PlatformTotals>,
    pub by_month: Vec<MonthlyTotals>,
    pub by_status: Vec<StatusTotals>,
}
