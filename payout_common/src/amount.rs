use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::{
    helpers::{format_fixed_point, parse_fixed_point},
    op,
    Currency,
    MoneyError,
};

//--------------------------------------       Amount        ---------------------------------------------------------
/// A money amount, in integer minor units of whatever currency it accompanies (satang for THB, cents for USD, yen
/// for JPY).
///
/// `Amount` does not carry its currency. Records store the currency alongside the amount, in the same way that an
/// order stores its total price and currency side by side.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Amount(i64);

op!(binary Amount, Add, add);
op!(binary Amount, Sub, sub);
op!(inplace Amount, AddAssign, add_assign);
op!(inplace Amount, SubAssign, sub_assign);
op!(unary Amount, Neg, neg);

impl Mul<i64> for Amount {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor_units(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `None` if the sum does not fit in an `i64`.
    pub fn checked_add(&self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Self)
    }

    /// The absolute difference between two amounts.
    pub fn abs_diff(&self, other: Amount) -> Amount {
        Self((self.0 - other.0).abs())
    }

    /// Parses a decimal major-unit string in the given currency, e.g. `"150.00"` THB becomes 15000 satang.
    pub fn parse_in(value: &str, currency: &Currency) -> Result<Self, MoneyError> {
        parse_fixed_point(value, currency.minor_unit_exponent()).map(Self).map_err(MoneyError::InvalidAmount)
    }

    /// Renders the amount in major units of `currency`. `Amount::from(85000).in_currency(&thb)` displays as
    /// `850.00 THB`.
    pub fn in_currency<'a>(&self, currency: &'a Currency) -> MoneyDisplay<'a> {
        MoneyDisplay { amount: *self, currency }
    }
}

pub struct MoneyDisplay<'a> {
    amount: Amount,
    currency: &'a Currency,
}

impl Display for MoneyDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let major = format_fixed_point(self.amount.value(), self.currency.minor_unit_exponent());
        write!(f, "{major} {}", self.currency)
    }
}
