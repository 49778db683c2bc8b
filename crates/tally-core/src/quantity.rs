//! # Quantity Module
//!
//! Provides the `Quantity` type for stock quantities.
//!
//! ## Why Fixed-Point?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Stock can be fractional (2.5 kg of flour, 0.75 l of syrup), but the   │
//! │  ledger invariant must hold EXACTLY after every posting:               │
//! │                                                                         │
//! │      closing = opening + in − out − sold                               │
//! │                                                                         │
//! │  With f64 that equality drifts after a few hundred postings.           │
//! │                                                                         │
//! │  OUR SOLUTION: integer thousandths                                     │
//! │    2.5 kg  → 2500                                                      │
//! │    0.75 l  → 750                                                       │
//! │    Addition and subtraction are exact; storage is a plain INTEGER.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::quantity::Quantity;
//!
//! let flour: Quantity = "2.5".parse().unwrap();
//! assert_eq!(flour.milli(), 2500);
//! assert_eq!((flour - Quantity::from_whole(3)).to_string(), "-0.5");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Number of fractional digits carried by a [`Quantity`].
pub const QUANTITY_SCALE_DIGITS: u32 = 3;

/// Thousandths per whole unit.
pub const MILLI_PER_UNIT: i64 = 1000;

// =============================================================================
// Quantity Type
// =============================================================================

/// A signed stock quantity with three fractional digits.
///
/// Balances may go negative (a reversal can outrun stock), so the type is
/// signed; posting quantities are validated as non-negative by the ledger.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Quantity(i64);

impl Quantity {
    /// Creates a quantity from thousandths of a unit.
    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    /// Creates a quantity from a whole number of units.
    ///
    /// ```rust
    /// use tally_core::quantity::Quantity;
    ///
    /// assert_eq!(Quantity::from_whole(10).milli(), 10_000);
    /// ```
    #[inline]
    pub const fn from_whole(units: i64) -> Self {
        Quantity(units * MILLI_PER_UNIT)
    }

    /// Returns the raw value in thousandths (the stored representation).
    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Checked addition; `None` on overflow.
    pub fn checked_add(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_add(other.0).map(Quantity)
    }

    /// Checked subtraction; `None` on overflow.
    pub fn checked_sub(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_sub(other.0).map(Quantity)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Prints the shortest exact decimal form: `10`, `2.5`, `-0.125`.
impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / MILLI_PER_UNIT as u64;
        let frac = abs % MILLI_PER_UNIT as u64;

        if frac == 0 {
            return write!(f, "{}{}", sign, whole);
        }

        let digits = format!("{:03}", frac);
        write!(f, "{}{}.{}", sign, whole, digits.trim_end_matches('0'))
    }
}

impl FromStr for Quantity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: &str| ValidationError::invalid_format("quantity", reason);

        if s.is_empty() {
            return Err(ValidationError::required("quantity"));
        }

        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (whole_part, frac_part) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole_part.is_empty() || !whole_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("expected a decimal number"));
        }
        if frac_part.len() > QUANTITY_SCALE_DIGITS as usize {
            return Err(invalid("at most 3 decimal places are supported"));
        }
        if !frac_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("expected a decimal number"));
        }

        let whole: i64 = whole_part.parse().map_err(|_| invalid("value is too large"))?;
        let frac: i64 = if frac_part.is_empty() {
            0
        } else {
            // "5" → 500, "25" → 250, "125" → 125
            let padded = format!("{:0<3}", frac_part);
            padded.parse().map_err(|_| invalid("expected a decimal number"))?
        };

        let milli = whole
            .checked_mul(MILLI_PER_UNIT)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(|| invalid("value is too large"))?;

        Ok(Quantity(if negative { -milli } else { milli }))
    }
}

impl Add for Quantity {
    type Output = Quantity;

    #[inline]
    fn add(self, other: Quantity) -> Quantity {
        Quantity(self.0 + other.0)
    }
}

impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Quantity) {
        self.0 += other.0;
    }
}

impl Sub for Quantity {
    type Output = Quantity;

    #[inline]
    fn sub(self, other: Quantity) -> Quantity {
        Quantity(self.0 - other.0)
    }
}

impl SubAssign for Quantity {
    #[inline]
    fn sub_assign(&mut self, other: Quantity) {
        self.0 -= other.0;
    }
}

impl Neg for Quantity {
    type Output = Quantity;

    #[inline]
    fn neg(self) -> Quantity {
        Quantity(-self.0)
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::zero(), |acc, q| acc + q)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_trims_fraction() {
        assert_eq!(Quantity::from_whole(10).to_string(), "10");
        assert_eq!(Quantity::from_milli(2500).to_string(), "2.5");
        assert_eq!(Quantity::from_milli(125).to_string(), "0.125");
        assert_eq!(Quantity::from_milli(-250).to_string(), "-0.25");
        assert_eq!(Quantity::zero().to_string(), "0");
    }

    #[test]
    fn test_parse() {
        assert_eq!("3".parse::<Quantity>().unwrap(), Quantity::from_whole(3));
        assert_eq!("2.5".parse::<Quantity>().unwrap().milli(), 2500);
        assert_eq!("0.05".parse::<Quantity>().unwrap().milli(), 50);
        assert_eq!("-1.125".parse::<Quantity>().unwrap().milli(), -1125);

        assert!("".parse::<Quantity>().is_err());
        assert!("abc".parse::<Quantity>().is_err());
        assert!("1.2345".parse::<Quantity>().is_err());
        assert!(".5".parse::<Quantity>().is_err());
        assert!("1.-5".parse::<Quantity>().is_err());
    }

    #[test]
    fn test_arithmetic() {
        let mut q = Quantity::from_whole(10);
        q -= Quantity::from_milli(2500);
        assert_eq!(q.milli(), 7500);
        q += Quantity::from_milli(500);
        assert_eq!(q, Quantity::from_whole(8));
        assert_eq!(-q, Quantity::from_whole(-8));

        let total: Quantity = [1, 2, 3].iter().map(|u| Quantity::from_whole(*u)).sum();
        assert_eq!(total, Quantity::from_whole(6));
    }

    #[test]
    fn test_checked_overflow() {
        assert!(Quantity::from_milli(i64::MAX)
            .checked_add(Quantity::from_milli(1))
            .is_none());
        assert!(Quantity::from_milli(i64::MIN)
            .checked_sub(Quantity::from_milli(1))
            .is_none());
        assert_eq!(
            Quantity::from_whole(3).checked_sub(Quantity::from_whole(5)),
            Some(Quantity::from_whole(-2))
        );
    }
}
