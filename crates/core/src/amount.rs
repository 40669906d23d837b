use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Signed transaction amount. Negative values are expenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(Decimal);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid amount: '{0}'")]
pub struct AmountParseError(pub String);

impl Amount {
    pub fn new(value: Decimal) -> Self {
        Amount(value)
    }

    pub fn zero() -> Self {
        Amount(Decimal::ZERO)
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_expense(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_income(self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn to_f64(self) -> f64 {
        self.0.normalize().to_f64().unwrap_or_default()
    }

    /// Parses the number formats found in Swiss bank exports:
    /// `1'234.50`, `-12,32`, `1,234.56`, `1.234,56`, `(75.25)`, `CHF 12.00`.
    pub fn parse(s: &str) -> Result<Self, AmountParseError> {
        let trimmed = s.trim();
        let (negative, body) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
            (true, &trimmed[1..trimmed.len() - 1])
        } else {
            (false, trimmed)
        };

        let mut cleaned: String = body
            .chars()
            .filter(|c| !matches!(c, '\'' | '’' | ' ' | '\u{a0}'))
            .collect();
        if let Some(rest) = cleaned.strip_prefix("CHF") {
            cleaned = rest.to_string();
        }
        // With both separators present the later one is the decimal point.
        cleaned = match (cleaned.rfind(','), cleaned.rfind('.')) {
            (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
            (Some(_), Some(_)) => cleaned.replace(',', ""),
            (Some(_), None) => cleaned.replace(',', "."),
            _ => cleaned,
        };

        let mut dec = Decimal::from_str(&cleaned).map_err(|_| AmountParseError(s.to_string()))?;
        if negative {
            dec = -dec;
        }
        Ok(Amount(dec))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount(value)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Amount(Decimal::from(value))
    }
}

impl Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Amount(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Amount(self.0 - rhs.0)
    }
}

impl Neg for Amount {
    type Output = Self;
    fn neg(self) -> Self {
        Amount(-self.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |a, b| a + b)
    }
}
