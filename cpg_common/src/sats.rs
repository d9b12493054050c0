use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const BTC_CURRENCY_CODE: &str = "BTC";
pub const SATS_PER_BTC: i64 = 100_000_000;

//--------------------------------------        Sats        ----------------------------------------------------------
/// An on-chain Bitcoin amount, stored as an integer number of satoshis.
///
/// The payment processor reports amounts as decimal BTC strings. Those are parsed with [`Sats::from_btc_str`], which
/// never goes through floating point, so `0.001 BTC` is exactly 100,000 sats.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Sats(i64);

op!(binary Sats, Add, add);
op!(binary Sats, Sub, sub);
op!(inplace Sats, AddAssign, add_assign);
op!(inplace Sats, SubAssign, sub_assign);
op!(unary Sats, Neg, neg);

impl Mul<i64> for Sats {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Sats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in satoshis: {0}")]
pub struct SatsConversionError(pub String);

impl From<i64> for Sats {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Sats {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Sats {}

impl TryFrom<u64> for Sats {
    type Error = SatsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(SatsConversionError(format!("Value {value} is too large to convert to Sats")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Sats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / SATS_PER_BTC;
        let frac = (self.0 % SATS_PER_BTC).abs();
        write!(f, "{whole}.{frac:08} BTC")
    }
}

impl Sats {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_btc(btc: i64) -> Self {
        Self(btc * SATS_PER_BTC)
    }

    /// Parse a decimal BTC string (e.g. "0.001") into satoshis without going through floating point.
    /// At most 8 fractional digits are accepted. Negative amounts are rejected.
    pub fn from_btc_str(s: &str) -> Result<Self, SatsConversionError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SatsConversionError("empty amount".to_string()));
        }
        if s.starts_with('-') {
            return Err(SatsConversionError(format!("negative amount: {s}")));
        }
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if frac.len() > 8 {
            return Err(SatsConversionError(format!("more than 8 decimal places: {s}")));
        }
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|e| SatsConversionError(format!("invalid BTC amount {s}: {e}")))?
        };
        let mut frac_sats: i64 = 0;
        if !frac.is_empty() {
            let digits: i64 = frac.parse().map_err(|e| SatsConversionError(format!("invalid BTC amount {s}: {e}")))?;
            frac_sats = digits * 10i64.pow(8 - frac.len() as u32);
        }
        whole
            .checked_mul(SATS_PER_BTC)
            .and_then(|w| w.checked_add(frac_sats))
            .map(Self)
            .ok_or_else(|| SatsConversionError(format!("overflow parsing {s}")))
    }
}

impl FromStr for Sats {
    type Err = SatsConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_btc_str(s)
    }
}
