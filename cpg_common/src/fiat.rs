use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::{op, Sats, SATS_PER_BTC};

//--------------------------------------      FiatAmount      --------------------------------------------------------
/// A fiat amount in integer cents. The currency itself is carried by context (column name or a `currency` field);
/// the same type is used for USD and MXN amounts as well as for cents-per-BTC exchange rates.
///
/// Serialized as the raw number of cents.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct FiatAmount(i64);

op!(binary FiatAmount, Add, add);
op!(binary FiatAmount, Sub, sub);
op!(inplace FiatAmount, AddAssign, add_assign);
op!(inplace FiatAmount, SubAssign, sub_assign);
op!(unary FiatAmount, Neg, neg);

impl Mul<i64> for FiatAmount {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for FiatAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a fiat amount: {0}")]
pub struct FiatConversionError(pub String);

impl From<i64> for FiatAmount {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl PartialEq for FiatAmount {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for FiatAmount {}

impl Display for FiatAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{sign}{}.{:02}", cents / 100, cents % 100)
    }
}

impl FiatAmount {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    /// Parse a major-unit decimal (as delivered by price feeds, e.g. `60000.0`) into cents.
    pub fn from_major_f64(value: f64) -> Result<Self, FiatConversionError> {
        if !value.is_finite() {
            return Err(FiatConversionError(format!("{value} is not a finite number")));
        }
        let cents = (value * 100.0).round();
        if cents.abs() > i64::MAX as f64 {
            return Err(FiatConversionError(format!("{value} is out of range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(cents as i64))
    }

    pub fn as_major_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Convert an on-chain amount into this fiat currency, treating `self` as an exchange rate expressed in cents
    /// per whole BTC. Rounds to the nearest cent; the intermediate product is computed in `i128`.
    pub fn convert_from_btc(&self, amount: Sats) -> Result<FiatAmount, FiatConversionError> {
        let product = i128::from(self.0) * i128::from(amount.value());
        let half = i128::from(SATS_PER_BTC) / 2;
        let cents = (product + half) / i128::from(SATS_PER_BTC);
        i64::try_from(cents)
            .map(Self)
            .map_err(|_| FiatConversionError(format!("converting {amount} at rate {self} overflows")))
    }
}
