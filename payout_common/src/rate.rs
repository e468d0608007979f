use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::{
    helpers::{format_fixed_point, parse_fixed_point},
    MoneyError,
};

const BASIS_POINTS_PER_PERCENT: i64 = 100;
const MAX_BASIS_POINTS: i64 = 100 * BASIS_POINTS_PER_PERCENT;

//--------------------------------------   CommissionRate    ---------------------------------------------------------
/// An OTA commission rate, as a percentage between 0 and 100 inclusive, held in basis points (1/100th of a percent).
///
/// Over the wire the rate is a decimal string with at most two decimal places: `"15"`, `"15.5"` or `"17.25"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct CommissionRate(i64);

impl CommissionRate {
    pub const ZERO: CommissionRate = CommissionRate(0);

    pub fn from_basis_points(bps: i64) -> Result<Self, MoneyError> {
        let rate = Self(bps);
        if rate.is_valid() {
            Ok(rate)
        } else {
            Err(MoneyError::InvalidRate(format!("{rate}% is outside the range [0, 100]")))
        }
    }

    pub fn from_percent(percent: i64) -> Result<Self, MoneyError> {
        let bps = percent
            .checked_mul(BASIS_POINTS_PER_PERCENT)
            .ok_or_else(|| MoneyError::InvalidRate(format!("{percent}% is outside the range [0, 100]")))?;
        Self::from_basis_points(bps)
    }

    pub fn basis_points(&self) -> i64 {
        self.0
    }

    /// Values read back from storage bypass the constructor, so anything doing arithmetic with a rate should check
    /// this first.
    pub fn is_valid(&self) -> bool {
        (0..=MAX_BASIS_POINTS).contains(&self.0)
    }
}

impl FromStr for CommissionRate {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bps = parse_fixed_point(s, 2).map_err(MoneyError::InvalidRate)?;
        Self::from_basis_points(bps)
    }
}

impl TryFrom<String> for CommissionRate {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CommissionRate> for String {
    fn from(value: CommissionRate) -> Self {
        value.to_string()
    }
}

impl Display for CommissionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_fixed_point(self.0, 2))
    }
}
