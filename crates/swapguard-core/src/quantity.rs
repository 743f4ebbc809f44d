//! Lot-size normalization for conditional orders.
//!
//! Take-profit and stop-loss quantities must be exact multiples of the
//! instrument's lot size. Market entry quantities are never passed through
//! here; the exchange accepts fractional sizes for them.

use crate::error::{CoreError, Result};
use crate::Size;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quantity rounded to a lot-size multiple and rendered for the wire.
///
/// Invariant: `rounded` is a multiple of `lot_size` and `rounded >= lot_size`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedQuantity {
    /// Quantity as originally requested.
    pub raw: Size,
    /// Rounded quantity.
    pub rounded: Size,
    /// Lot size the rounding was performed against.
    pub lot_size: Size,
    /// Digits used in `display`.
    pub amount_precision: u32,
    /// `rounded` with exactly `amount_precision` decimal digits.
    pub display: String,
}

impl NormalizedQuantity {
    /// Whether rounding changed the requested quantity.
    pub fn was_adjusted(&self) -> bool {
        self.raw != self.rounded
    }
}

impl fmt::Display for NormalizedQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Decimal digits implied by a lot size.
///
/// `0.01` -> 2, `0.5` -> 1, `1.0` -> 0, `10` -> 0. Trailing zeros in the
/// decimal representation do not count.
pub fn amount_precision(lot_size: Decimal) -> u32 {
    lot_size.normalize().scale()
}

/// Round `raw` to the nearest multiple of `lot_size`.
///
/// Ties round away from zero, and a result of zero is raised to one lot so
/// that a protective order is never silently dropped.
///
/// # Errors
/// `CoreError::InvalidArgument` if `raw < 0` or `lot_size <= 0`.
pub fn normalize(raw: Size, lot_size: Size) -> Result<NormalizedQuantity> {
    if raw.inner().is_sign_negative() && !raw.is_zero() {
        return Err(CoreError::InvalidArgument(format!(
            "quantity must be non-negative, got {raw}"
        )));
    }
    if !lot_size.is_positive() {
        return Err(CoreError::InvalidArgument(format!(
            "lot size must be positive, got {lot_size}"
        )));
    }
    let out_of_range = || {
        CoreError::InvalidArgument(format!(
            "quantity {raw} is out of range for lot size {lot_size}"
        ))
    };
    let multiples = raw.lots_half_up(lot_size).ok_or_else(out_of_range)?;

    let mut rounded = multiples
        .checked_mul(lot_size.inner())
        .ok_or_else(out_of_range)?;
    if rounded.is_zero() {
        rounded = lot_size.inner();
    }

    let precision = amount_precision(lot_size.inner());
    let mut shown = rounded;
    shown.rescale(precision);

    Ok(NormalizedQuantity {
        raw,
        rounded: Size::new(rounded),
        lot_size,
        amount_precision: precision,
        display: shown.to_string(),
    })
}
