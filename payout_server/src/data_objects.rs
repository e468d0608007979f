use chrono::{DateTime, Utc};
use payout_engine::db_types::{Amount, CommissionRate, Currency, NewPayoutRecord, OrganizationId, OtaPlatform};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/payouts`. The organization comes from the request, never from the body.
///
/// Either `ota_commission_amount` or `ota_commission_rate` (or both, if they agree) must be given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportPayoutParams {
    pub property_id: String,
    pub reservation_code: String,
    pub ota_platform: OtaPlatform,
    pub guest_paid_amount: Amount,
    #[serde(default)]
    pub ota_commission_amount: Option<Amount>,
    #[serde(default)]
    pub ota_commission_rate: Option<CommissionRate>,
    /// The net payout the OTA says it will remit, if it reported one.
    #[serde(default)]
    pub net_payout_amount: Option<Amount>,
    pub currency: Currency,
    #[serde(default)]
    pub hostaway_sync: bool,
    #[serde(default)]
    pub email_parsed: bool,
    #[serde(default)]
    pub check_out_date: Option<DateTime<Utc>>,
}

impl ImportPayoutParams {
    pub fn into_new_payout(self, org: OrganizationId) -> NewPayoutRecord {
        let mut payout = NewPayoutRecord::new(
            org,
            &self.property_id,
            &self.reservation_code,
            self.ota_platform,
            self.guest_paid_amount,
            self.currency,
        );
        payout.ota_commission_amount = self.ota_commission_amount;
        payout.ota_commission_rate = self.ota_commission_rate;
        payout.reported_net_payout = self.net_payout_amount;
        payout.check_out_date = self.check_out_date;
        payout.hostaway_sync = self.hostaway_sync;
        payout.email_parsed = self.email_parsed;
        payout
    }
}

/// Optional body for the confirm and received routes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionParams {
    #[serde(default)]
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveAlertParams {
    pub resolution_notes: String,
}
