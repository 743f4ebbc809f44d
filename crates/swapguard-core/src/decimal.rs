//! Precision-safe decimal types for trading.
//!
//! Uses `rust_decimal` for exact decimal arithmetic. Quantities that reach the
//! exchange are derived from these types and never from binary floats.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Mul;
use std::str::FromStr;

/// Price with exact decimal precision.
///
/// Used for limit prices and take-profit / stop-loss trigger prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Wire representation without trailing zeros.
    pub fn to_wire(&self) -> String {
        self.0.normalize().to_string()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

/// Size/quantity with exact decimal precision.
///
/// Wraps `Decimal` to keep quantities from being mixed with prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Size(pub Decimal);

impl Size {
    pub const ZERO: Self = Self(Decimal::ZERO);
    pub const ONE: Self = Self(Decimal::ONE);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Number of whole lots closest to this size, ties away from zero.
    ///
    /// `2.5` lots becomes `3`, never `2`. Returns `None` for a non-positive
    /// lot size or when the lot count does not fit in a `Decimal`.
    #[inline]
    pub fn lots_half_up(&self, lot_size: Size) -> Option<Decimal> {
        if !lot_size.is_positive() {
            return None;
        }
        let lots = self.0.checked_div(lot_size.0)?;
        Some(lots.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Wire representation without trailing zeros.
    pub fn to_wire(&self) -> String {
        self.0.normalize().to_string()
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Size {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Size {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Mul<Decimal> for Size {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_lots_half_up_ties_away_from_zero() {
        let lot = Size::new(dec!(1));
        assert_eq!(Size::new(dec!(2.5)).lots_half_up(lot), Some(dec!(3)));
        assert_eq!(Size::new(dec!(3.5)).lots_half_up(lot), Some(dec!(4)));
        assert_eq!(Size::new(dec!(2.4999)).lots_half_up(lot), Some(dec!(2)));
    }

    #[test]
    fn test_lots_half_up_fractional_lot() {
        let lot = Size::new(dec!(0.01));
        assert_eq!(Size::new(dec!(1.2345)).lots_half_up(lot), Some(dec!(123)));
        assert_eq!(Size::new(dec!(0.005)).lots_half_up(lot), Some(dec!(1)));
    }

    #[test]
    fn test_lots_half_up_rejects_non_positive_lot() {
        assert_eq!(Size::new(dec!(1)).lots_half_up(Size::ZERO), None);
        assert_eq!(Size::new(dec!(1)).lots_half_up(Size::new(dec!(-0.1))), None);
    }

    #[test]
    fn test_lots_half_up_overflow() {
        assert_eq!(Size::new(Decimal::MAX).lots_half_up(Size::new(dec!(0.001))), None);
        assert_eq!(Size::new(Decimal::MAX).lots_half_up(Size::new(dec!(1))), Some(Decimal::MAX));
    }

    #[test]
    fn test_wire_strips_trailing_zeros() {
        assert_eq!(Size::new(dec!(0.21270)).to_wire(), "0.2127");
        assert_eq!(Price::new(dec!(2450.50)).to_wire(), "2450.5");
        assert_eq!(Price::new(dec!(3000)).to_wire(), "3000");
    }

    #[test]
    fn test_contract_conversion() {
        let contracts = Size::new(dec!(3));
        assert_eq!((contracts * dec!(0.01)).inner(), dec!(0.03));
    }
}
