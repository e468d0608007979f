use serde::{Deserialize, Serialize};

use crate::db_types::{Alert, PayoutRecord};

/// The outcome of persisting alert policy findings for one payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertsRecorded {
    pub payout: PayoutRecord,
    /// Alerts that were actually inserted. Findings that duplicated an open alert are not included.
    pub new_alerts: Vec<Alert>,
    /// True if the payout's status changed as a result.
    pub status_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideResult {
    pub payout: PayoutRecord,
    /// The `commission_mismatch` alerts that the override resolved.
    pub resolved_alerts: Vec<Alert>,
}
