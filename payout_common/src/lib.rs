//! Fixed-point money primitives for OTA payout reconciliation.
//!
//! Amounts are always held as integer minor units of their currency. There is deliberately no conversion from or to
//! floating point anywhere in this crate.
mod amount;
mod currency;
pub mod helpers;
mod op;
mod rate;

pub use amount::{Amount, MoneyDisplay};
pub use currency::Currency;
pub use rate::CommissionRate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),
    #[error("Invalid commission rate: {0}")]
    InvalidRate(String),
}
