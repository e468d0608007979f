use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use payout_common::{Amount, CommissionRate, Currency};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------    OrganizationId    ---------------------------------------------------------
/// The tenant that owns a set of payouts and alerts. Every engine call is scoped to exactly one organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrganizationId(String);

impl OrganizationId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OrganizationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for OrganizationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for OrganizationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------        UserId        ---------------------------------------------------------
/// The operator (or integration) performing a write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------      OtaPlatform     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OtaPlatform {
    Airbnb,
    BookingCom,
    Vrbo,
    /// Booked directly with the property; no OTA commission is normally due.
    Direct,
    Other,
}

impl Display for OtaPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OtaPlatform::Airbnb => write!(f, "airbnb"),
            OtaPlatform::BookingCom => write!(f, "booking_com"),
            OtaPlatform::Vrbo => write!(f, "vrbo"),
            OtaPlatform::Direct => write!(f, "direct"),
            OtaPlatform::Other => write!(f, "other"),
        }
    }
}

impl FromStr for OtaPlatform {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "airbnb" => Ok(Self::Airbnb),
            "booking_com" => Ok(Self::BookingCom),
            "vrbo" => Ok(Self::Vrbo),
            "direct" => Ok(Self::Direct),
            "other" => Ok(Self::Other),
            s => Err(ConversionError(format!("Invalid OTA platform: {s}"))),
        }
    }
}

//--------------------------------------     PayoutStatus     ---------------------------------------------------------
/// The settlement status of a booking payout.
///
/// | From          | Action               | To            |
/// |---------------|----------------------|---------------|
/// | `pending`     | confirm              | `confirmed`   |
/// | `pending`     | commission mismatch  | `discrepancy` |
/// | `confirmed`   | commission mismatch  | `discrepancy` |
/// | `discrepancy` | confirm              | `confirmed`   |
/// | `discrepancy` | override             | `confirmed`   |
/// | not received  | settlement           | `received`    |
///
/// `received` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Imported, waiting for an operator to confirm it.
    Pending,
    /// Acknowledged by an operator.
    Confirmed,
    /// The funds have settled. Nothing moves a payout out of this state.
    Received,
    /// The stored amounts disagree with the reconciliation rule.
    Discrepancy,
}

impl PayoutStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PayoutStatus::Received)
    }

    /// The status after an operator confirmation, or `None` if confirming is illegal from here.
    pub fn confirm(&self) -> Option<PayoutStatus> {
        match self {
            PayoutStatus::Pending | PayoutStatus::Discrepancy => Some(PayoutStatus::Confirmed),
            PayoutStatus::Confirmed | PayoutStatus::Received => None,
        }
    }

    /// The status after a manual override. Overrides only ever clear a discrepancy.
    pub fn after_override(&self) -> PayoutStatus {
        match self {
            PayoutStatus::Discrepancy => PayoutStatus::Confirmed,
            s => *s,
        }
    }

    /// The status after a commission mismatch is detected.
    pub fn after_mismatch(&self) -> PayoutStatus {
        match self {
            PayoutStatus::Received => PayoutStatus::Received,
            _ => PayoutStatus::Discrepancy,
        }
    }

    /// The status after an external settlement event, or `None` if the payout has already settled.
    pub fn settle(&self) -> Option<PayoutStatus> {
        match self {
            PayoutStatus::Received => None,
            _ => Some(PayoutStatus::Received),
        }
    }
}

impl Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutStatus::Pending => write!(f, "pending"),
            PayoutStatus::Confirmed => write!(f, "confirmed"),
            PayoutStatus::Received => write!(f, "received"),
            PayoutStatus::Discrepancy => write!(f, "discrepancy"),
        }
    }
}

impl FromStr for PayoutStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "received" => Ok(Self::Received),
            "discrepancy" => Ok(Self::Discrepancy),
            s => Err(ConversionError(format!("Invalid payout status: {s}"))),
        }
    }
}

//--------------------------------------     PayoutRecord     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub id: i64,
    pub organization_id: OrganizationId,
    pub property_id: String,
    /// The booking reference assigned by the OTA
    pub reservation_code: String,
    pub ota_platform: OtaPlatform,
    pub guest_paid_amount: Amount,
    pub ota_commission_amount: Amount,
    /// Not every OTA reports a rate. Some only report the absolute commission.
    pub ota_commission_rate: Option<CommissionRate>,
    pub net_payout_amount: Amount,
    pub currency: Currency,
    pub payout_status: PayoutStatus,
    pub manual_override: bool,
    pub override_reason: Option<String>,
    pub override_by: Option<UserId>,
    pub override_at: Option<DateTime<Utc>>,
    pub payout_confirmed_by: Option<UserId>,
    pub payout_confirmed_at: Option<DateTime<Utc>>,
    pub hostaway_sync: bool,
    pub email_parsed: bool,
    pub check_out_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented on every write. Callers pass back the version they read to detect lost updates.
    pub version: i64,
}

impl PayoutRecord {
    /// True if the override metadata explains a manual override. Blank reasons do not count.
    pub fn has_override_reason(&self) -> bool {
        self.override_reason.as_deref().is_some_and(|r| !r.trim().is_empty())
    }

    /// The point in time from which a pending payout is considered overdue for confirmation.
    pub fn confirmation_reference_time(&self) -> DateTime<Utc> {
        self.check_out_date.unwrap_or(self.created_at)
    }
}

//--------------------------------------   NewPayoutRecord    ---------------------------------------------------------
/// A booking payout as reported by an upstream OTA integration (webhook or parsed email).
#[derive(Debug, Clone)]
pub struct NewPayoutRecord {
    pub organization_id: OrganizationId,
    pub property_id: String,
    pub reservation_code: String,
    pub ota_platform: OtaPlatform,
    pub guest_paid_amount: Amount,
    pub ota_commission_amount: Option<Amount>,
    pub ota_commission_rate: Option<CommissionRate>,
    /// The payout the OTA says it will remit. When absent, the reconciled net payout is stored.
    pub reported_net_payout: Option<Amount>,
    pub currency: Currency,
    pub hostaway_sync: bool,
    pub email_parsed: bool,
    pub check_out_date: Option<DateTime<Utc>>,
}

impl NewPayoutRecord {
    pub fn new(
        organization_id: OrganizationId,
        property_id: &str,
        reservation_code: &str,
        ota_platform: OtaPlatform,
        guest_paid_amount: Amount,
        currency: Currency,
    ) -> Self {
        Self {
            organization_id,
            property_id: property_id.to_string(),
            reservation_code: reservation_code.to_string(),
            ota_platform,
            guest_paid_amount,
            ota_commission_amount: None,
            ota_commission_rate: None,
            reported_net_payout: None,
            currency,
            hostaway_sync: false,
            email_parsed: false,
            check_out_date: None,
        }
    }

    pub fn with_commission_rate(mut self, rate: CommissionRate) -> Self {
        self.ota_commission_rate = Some(rate);
        self
    }

    pub fn with_commission_amount(mut self, amount: Amount) -> Self {
        self.ota_commission_amount = Some(amount);
        self
    }

    pub fn with_reported_net_payout(mut self, amount: Amount) -> Self {
        self.reported_net_payout = Some(amount);
        self
    }

    pub fn with_check_out_date(mut self, check_out: DateTime<Utc>) -> Self {
        self.check_out_date = Some(check_out);
        self
    }

    pub fn synced_from_hostaway(mut self) -> Self {
        self.hostaway_sync = true;
        self
    }

    pub fn parsed_from_email(mut self) -> Self {
        self.email_parsed = true;
        self
    }
}

//--------------------------------------        Alerts        ---------------------------------------------------------
pub mod alert_types {
    pub const MISSING_CONFIRMATION: &str = "missing_confirmation";
    pub const COMMISSION_MISMATCH: &str = "commission_mismatch";
    pub const UNEXPLAINED_OVERRIDE: &str = "unexplained_override";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Low => write!(f, "low"),
            AlertSeverity::Medium => write!(f, "medium"),
            AlertSeverity::High => write!(f, "high"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for AlertSeverity {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            s => Err(ConversionError(format!("Invalid alert severity: {s}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub organization_id: OrganizationId,
    /// `None` for system-wide alerts
    pub booking_payout_id: Option<i64>,
    pub alert_type: String,
    pub alert_message: String,
    pub severity: AlertSeverity,
    pub is_resolved: bool,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlert {
    pub organization_id: OrganizationId,
    pub booking_payout_id: Option<i64>,
    pub alert_type: String,
    pub alert_message: String,
    pub severity: AlertSeverity,
}
