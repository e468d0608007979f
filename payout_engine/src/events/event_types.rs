use serde::{Deserialize, Serialize};

use crate::db_types::{Alert, PayoutRecord};

/// A new alert was stored. Duplicates of alerts that were already open do not raise this event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRaisedEvent {
    pub alert: Alert,
}

impl AlertRaisedEvent {
    pub fn new(alert: Alert) -> Self {
        Self { alert }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutConfirmedEvent {
    pub payout: PayoutRecord,
}

impl PayoutConfirmedEvent {
    pub fn new(payout: PayoutRecord) -> Self {
        Self { payout }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutOverriddenEvent {
    pub old_payout: PayoutRecord,
    pub new_payout: PayoutRecord,
    /// The mismatch alerts that the override resolved
    pub resolved_alerts: Vec<Alert>,
}

impl PayoutOverriddenEvent {
    pub fn new(old_payout: PayoutRecord, new_payout: PayoutRecord, resolved_alerts: Vec<Alert>) -> Self {
        Self { old_payout, new_payout, resolved_alerts }
    }
}
