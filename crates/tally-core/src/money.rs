//! # Money Module
//!
//! Provides `Money` (integer minor units) and `Rate` (basis points) for
//! pricing document lines.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │                                                                         │
//! │  A receipt's grand total must equal the sum of its lines to the cent.  │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units (cents)                             │
//! │    Every amount is an i64; rounding happens exactly once per product   │
//! │    (qty × price, amount × rate), half away from zero.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::{Money, Rate};
//! use tally_core::quantity::Quantity;
//!
//! let price = Money::from_cents(1250);                          // 12.50
//! let amount = price.multiply_quantity(Quantity::from_milli(1500)); // × 1.5
//! assert_eq!(amount, Some(Money::from_cents(1875)));
//!
//! let tax = Money::from_cents(1875).percentage(Rate::from_bps(1000)); // 10 %
//! assert_eq!(tax, Some(Money::from_cents(188)));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

use crate::quantity::{Quantity, MILLI_PER_UNIT};

/// Basis points in 100 %.
pub const BPS_PER_WHOLE: u32 = 10_000;

// =============================================================================
// Rate
// =============================================================================

/// A percentage in basis points (1 bp = 0.01 %).
///
/// Used for both line discount percentages and tax percentages.
/// 1250 bps = 12.5 %.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from whole percent (`from_percent(10)` = 10 %).
    #[inline]
    pub const fn from_percent(percent: u32) -> Self {
        Rate(percent * 100)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            write!(f, "{}%", whole)
        } else {
            write!(f, "{}.{:02}%", whole, frac)
        }
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: negative values appear in change computation
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **No currency**: a single-currency store; formatting is the UI's job
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a (fractional) quantity.
    ///
    /// ## Rounding
    /// `cents × milli / 1000`, rounded half away from zero.
    /// `None` when the result does not fit in i64 cents.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    /// use tally_core::quantity::Quantity;
    ///
    /// let price = Money::from_cents(299);
    /// assert_eq!(price.multiply_quantity(Quantity::from_whole(3)), Some(Money::from_cents(897)));
    /// assert_eq!(price.multiply_quantity(Quantity::from_milli(500)), Some(Money::from_cents(150)));
    /// ```
    pub fn multiply_quantity(&self, qty: Quantity) -> Option<Money> {
        let product = self.0 as i128 * qty.milli() as i128;
        i64::try_from(round_div(product, MILLI_PER_UNIT as i128)).ok().map(Money)
    }

    /// Returns `rate` percent of this amount.
    ///
    /// ## Implementation
    /// Integer math: `cents × bps / 10000`, rounded half away from zero,
    /// over an i128 intermediate. `None` when the result does not fit in
    /// i64 cents (only possible for rates above 100 %).
    ///
    /// ```rust
    /// use tally_core::money::{Money, Rate};
    ///
    /// // 10.00 at 8.25 % = 0.825 → 0.83
    /// let tax = Money::from_cents(1000).percentage(Rate::from_bps(825));
    /// assert_eq!(tax, Some(Money::from_cents(83)));
    /// ```
    pub fn percentage(&self, rate: Rate) -> Option<Money> {
        let product = self.0 as i128 * rate.bps() as i128;
        i64::try_from(round_div(product, BPS_PER_WHOLE as i128)).ok().map(Money)
    }

    /// Checked addition; `None` on overflow.
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Checked subtraction; `None` on overflow.
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

/// Integer division rounding half away from zero.
fn round_div(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly rendering with two decimals (`12.50`, `-0.05`).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
