//! # Balance Arithmetic
//!
//! The arithmetic half of the posting primitive. The stock ledger loads a
//! balance row, applies one [`PostingKind`] through [`BalanceFigures::post`],
//! and writes the figures back.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      One balance row                                    │
//! │                                                                         │
//! │   opening ──┐                                                           │
//! │             ├──► closing = opening + inbound − outbound − sold          │
//! │   inbound ──┤         (holds after EVERY posting)                       │
//! │   outbound ─┤                                                           │
//! │   sold ─────┘                                                           │
//! │                                                                         │
//! │   IN   → inbound  += q        Accumulators only grow; a reversal       │
//! │   OUT  → outbound += q        posts the opposite kind with the same    │
//! │   SOLD → sold     += q        quantity.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::quantity::Quantity;

// =============================================================================
// Posting Kind
// =============================================================================

/// Direction of a posting.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PostingKind {
    In,
    Out,
    Sold,
}

impl PostingKind {
    /// The kind that undoes this one.
    ///
    /// `Sold` is undone by `In`: a cancelled sale returns goods to stock.
    pub const fn opposite(&self) -> PostingKind {
        match self {
            PostingKind::In => PostingKind::Out,
            PostingKind::Out => PostingKind::In,
            PostingKind::Sold => PostingKind::In,
        }
    }
}

impl fmt::Display for PostingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PostingKind::In => "in",
            PostingKind::Out => "out",
            PostingKind::Sold => "sold",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Balance Figures
// =============================================================================

/// The five quantities of a balance row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BalanceFigures {
    pub opening: Quantity,
    pub inbound: Quantity,
    pub outbound: Quantity,
    pub sold: Quantity,
    pub closing: Quantity,
}

impl BalanceFigures {
    /// A fresh row: accumulators zero, closing equal to opening.
    pub fn opening(opening: Quantity) -> Self {
        BalanceFigures {
            opening,
            closing: opening,
            ..Default::default()
        }
    }

    /// Applies one posting and recomputes closing.
    ///
    /// Quantities must be non-negative: direction is expressed by `kind`.
    /// On overflow the figures are left untouched.
    pub fn post(&mut self, kind: PostingKind, quantity: Quantity) -> Result<(), ValidationError> {
        if quantity.is_negative() {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            });
        }

        let mut next = *self;
        let accumulator = match kind {
            PostingKind::In => &mut next.inbound,
            PostingKind::Out => &mut next.outbound,
            PostingKind::Sold => &mut next.sold,
        };
        *accumulator = accumulator
            .checked_add(quantity)
            .ok_or_else(|| ValidationError::overflow(format!("{kind} quantity")))?;
        next.closing = next
            .expected_closing()
            .ok_or_else(|| ValidationError::overflow("closing quantity"))?;

        *self = next;
        Ok(())
    }

    /// `opening + inbound − outbound − sold`; `None` if it leaves the i64 range.
    pub fn expected_closing(&self) -> Option<Quantity> {
        self.opening
            .checked_add(self.inbound)?
            .checked_sub(self.outbound)?
            .checked_sub(self.sold)
    }

    pub fn is_consistent(&self) -> bool {
        self.expected_closing() == Some(self.closing)
    }

    /// Opening figures for the successor period.
    ///
    /// `None` when closing is exactly zero; such rows are not carried.
    pub fn carry_forward(&self) -> Option<BalanceFigures> {
        if self.closing.is_zero() {
            None
        } else {
            Some(BalanceFigures::opening(self.closing))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_post_each_kind() {
        let mut f = BalanceFigures::opening(Quantity::from_whole(5));
        f.post(PostingKind::In, Quantity::from_whole(10)).unwrap();
        f.post(PostingKind::Out, Quantity::from_whole(4)).unwrap();
        f.post(PostingKind::Sold, Quantity::from_milli(2500)).unwrap();

        assert_eq!(f.inbound, Quantity::from_whole(10));
        assert_eq!(f.outbound, Quantity::from_whole(4));
        assert_eq!(f.sold, Quantity::from_milli(2500));
        assert_eq!(f.closing, Quantity::from_milli(8500));
        assert!(f.is_consistent());
    }

    #[test]
    fn test_negative_quantity_rejected_and_row_untouched() {
        let mut f = BalanceFigures::opening(Quantity::from_whole(1));
        assert!(f.post(PostingKind::In, Quantity::from_whole(-1)).is_err());
        assert_eq!(f, BalanceFigures::opening(Quantity::from_whole(1)));
    }

    #[test]
    fn test_reversal_restores_closing() {
        let mut f = BalanceFigures::opening(Quantity::zero());
        let q = Quantity::from_whole(7);
        f.post(PostingKind::In, q).unwrap();
        f.post(PostingKind::In.opposite(), q).unwrap();
        assert!(f.closing.is_zero());
        // the audit trail keeps both sides
        assert_eq!(f.inbound, q);
        assert_eq!(f.outbound, q);
    }

    #[test]
    fn test_carry_forward_skips_zero() {
        let mut f = BalanceFigures::opening(Quantity::from_whole(3));
        assert_eq!(
            f.carry_forward(),
            Some(BalanceFigures::opening(Quantity::from_whole(3)))
        );
        f.post(PostingKind::Sold, Quantity::from_whole(3)).unwrap();
        assert_eq!(f.carry_forward(), None);
    }

    #[test]
    fn test_negative_closing_is_carried() {
        let mut f = BalanceFigures::opening(Quantity::zero());
        f.post(PostingKind::Out, Quantity::from_whole(2)).unwrap();
        let next = f.carry_forward().unwrap();
        assert_eq!(next.opening, Quantity::from_whole(-2));
        assert_eq!(next.closing, Quantity::from_whole(-2));
    }

    #[test]
    fn test_overflow_rejected_and_row_untouched() {
        let mut f = BalanceFigures::opening(Quantity::zero());
        f.post(PostingKind::In, Quantity::from_milli(i64::MAX)).unwrap();
        let before = f;

        let err = f.post(PostingKind::In, Quantity::from_milli(1)).unwrap_err();
        assert!(matches!(err, ValidationError::Overflow { .. }));
        assert_eq!(err.to_string(), "in quantity exceeds the supported range");
        assert_eq!(f, before);
        assert!(f.is_consistent());
    }

    #[test]
    fn test_closing_overflow_rejected() {
        // accumulators fit, but the closing would fall below i64::MIN
        let mut f = BalanceFigures::opening(Quantity::from_milli(-2));
        let err = f.post(PostingKind::Out, Quantity::from_milli(i64::MAX)).unwrap_err();
        assert_eq!(err.to_string(), "closing quantity exceeds the supported range");
        assert_eq!(f, BalanceFigures::opening(Quantity::from_milli(-2)));
    }

    fn posting() -> impl Strategy<Value = (PostingKind, i64)> {
        (
            prop_oneof![
                Just(PostingKind::In),
                Just(PostingKind::Out),
                Just(PostingKind::Sold)
            ],
            0i64..1_000_000,
        )
    }

    proptest! {
        #[test]
        fn prop_closing_identity_holds_after_every_post(
            opening in -1_000_000i64..1_000_000,
            posts in proptest::collection::vec(posting(), 0..64),
        ) {
            let mut f = BalanceFigures::opening(Quantity::from_milli(opening));
            prop_assert!(f.is_consistent());
            for (kind, milli) in posts {
                f.post(kind, Quantity::from_milli(milli)).unwrap();
                prop_assert!(f.is_consistent());
                prop_assert!(!f.inbound.is_negative());
                prop_assert!(!f.outbound.is_negative());
                prop_assert!(!f.sold.is_negative());
            }
        }
    }
}
