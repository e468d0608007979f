//! The reconciliation rule relating what the guest paid, what the OTA kept and what the property receives.
//!
//! `guest_paid = commission + net_payout` holds exactly for every successful [`reconcile`] call. Commission derived
//! from a rate is rounded half-to-even at minor-unit precision and the net payout is obtained by subtraction, so the
//! identity never drifts.
use payout_common::helpers::div_round_half_even;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Amount, CommissionRate};

/// How far (in minor units) a supplied commission amount may stray from the rate-derived one.
pub const RECONCILIATION_TOLERANCE: Amount = Amount::from_minor_units(1);

const BASIS_POINTS_IN_WHOLE: i128 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    #[error("Commission rate {0}% is outside the range [0, 100]")]
    InvalidRate(CommissionRate),
    #[error("Either a commission amount or a commission rate is required")]
    AmbiguousInput,
    #[error("Commission amount {supplied} disagrees with {derived}, derived from the commission rate")]
    InconsistentInput { supplied: Amount, derived: Amount },
    #[error("Commission {commission} exceeds the guest payment {guest_paid}")]
    NegativePayout { guest_paid: Amount, commission: Amount },
    #[error("Money amounts cannot be negative. Got {0}")]
    NegativeAmount(Amount),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationInput {
    pub guest_paid_amount: Amount,
    pub commission_amount: Option<Amount>,
    pub commission_rate: Option<CommissionRate>,
}

impl ReconciliationInput {
    pub fn from_rate(guest_paid_amount: Amount, rate: CommissionRate) -> Self {
        Self { guest_paid_amount, commission_amount: None, commission_rate: Some(rate) }
    }

    pub fn from_commission(guest_paid_amount: Amount, commission: Amount) -> Self {
        Self { guest_paid_amount, commission_amount: Some(commission), commission_rate: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub guest_paid_amount: Amount,
    pub commission_amount: Amount,
    pub commission_rate: Option<CommissionRate>,
    pub net_payout_amount: Amount,
}

/// The commission owed on `guest_paid` at `rate`, rounded half-to-even to the nearest minor unit.
pub fn commission_for_rate(guest_paid: Amount, rate: CommissionRate) -> Result<Amount, ReconciliationError> {
    if !rate.is_valid() {
        return Err(ReconciliationError::InvalidRate(rate));
    }
    let numerator = i128::from(guest_paid.value()) * i128::from(rate.basis_points());
    let commission = div_round_half_even(numerator, BASIS_POINTS_IN_WHOLE);
    // |commission| <= |guest_paid| since the rate is at most 100%
    Ok(Amount::from(commission as i64))
}

pub fn reconcile(input: ReconciliationInput) -> Result<Reconciliation, ReconciliationError> {
    let guest_paid = input.guest_paid_amount;
    if guest_paid.is_negative() {
        return Err(ReconciliationError::NegativeAmount(guest_paid));
    }
    if let Some(supplied) = input.commission_amount {
        if supplied.is_negative() {
            return Err(ReconciliationError::NegativeAmount(supplied));
        }
    }
    let commission = match (input.commission_amount, input.commission_rate) {
        (None, None) => return Err(ReconciliationError::AmbiguousInput),
        (Some(supplied), None) => supplied,
        (None, Some(rate)) => commission_for_rate(guest_paid, rate)?,
        (Some(supplied), Some(rate)) => {
            let derived = commission_for_rate(guest_paid, rate)?;
            if supplied.abs_diff(derived) > RECONCILIATION_TOLERANCE {
                return Err(ReconciliationError::InconsistentInput { supplied, derived });
            }
            supplied
        },
    };
    let net_payout = guest_paid - commission;
    if net_payout.is_negative() {
        return Err(ReconciliationError::NegativePayout { guest_paid, commission });
    }
    Ok(Reconciliation {
        guest_paid_amount: guest_paid,
        commission_amount: commission,
        commission_rate: input.commission_rate,
        net_payout_amount: net_payout,
    })
}
