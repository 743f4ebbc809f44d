//! Instrument identification and trading constraints.
//!
//! Perpetual swaps are identified by exchange instrument ids such as
//! `ETH-USDT-SWAP`. Conditional orders on an instrument must be an exact
//! multiple of its lot size.

use crate::error::{CoreError, Result};
use crate::quantity::amount_precision;
use crate::Size;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lot size used when an instrument definition carries neither a precision
/// field nor a minimum quantity.
pub const DEFAULT_LOT_SIZE: Decimal = Decimal::ONE;

const SWAP_SUFFIX: &str = "-USDT-SWAP";

/// Exchange instrument identifier (e.g., "ETH-USDT-SWAP").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstId(String);

impl InstId {
    /// Create from a full instrument id.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidInstId(id));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Build a USDT-margined swap id from a bare asset name.
    ///
    /// `"BTC"` becomes `"BTC-USDT-SWAP"`; ids that already name a swap are
    /// kept as they are.
    pub fn from_asset(asset: &str) -> Result<Self> {
        let upper = asset.trim().to_ascii_uppercase();
        if upper.ends_with("-SWAP") {
            Self::new(upper)
        } else {
            Self::new(format!("{upper}{SWAP_SUFFIX}"))
        }
    }

    /// Bare asset name (`"BTC-USDT-SWAP"` -> `"BTC"`).
    pub fn asset(&self) -> &str {
        self.0.strip_suffix(SWAP_SUFFIX).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InstId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which field the lot size was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotSizeSource {
    /// The instrument's amount-precision field (`lotSz`).
    Precision,
    /// The instrument's minimum order quantity (`minSz`).
    MinQuantity,
    /// Neither field present; `DEFAULT_LOT_SIZE` applied.
    Default,
    /// Remote fetch failed; a configured per-symbol fallback applied.
    Fallback,
}

impl fmt::Display for LotSizeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Precision => write!(f, "precision"),
            Self::MinQuantity => write!(f, "min_quantity"),
            Self::Default => write!(f, "default"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Per-instrument trading constraints.
///
/// Invariant: `lot_size > 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: InstId,
    /// Minimum increment accepted for conditional-order quantities.
    pub lot_size: Size,
    /// Minimum order quantity, when the exchange publishes one.
    pub min_size: Option<Size>,
    /// Underlying per contract. Informational only.
    pub contract_size: Size,
    /// Decimal digits implied by `lot_size`.
    pub amount_precision: u32,
    pub lot_size_source: LotSizeSource,
}

impl Instrument {
    /// Resolve an instrument from the raw definition fields.
    ///
    /// Lot size comes from the precision field, else the minimum quantity,
    /// else `DEFAULT_LOT_SIZE`. Non-positive values count as absent.
    pub fn from_definition(
        symbol: InstId,
        precision: Option<Decimal>,
        min_quantity: Option<Decimal>,
        contract_size: Option<Decimal>,
    ) -> Self {
        let precision = precision.filter(is_positive);
        let min_quantity = min_quantity.filter(is_positive);

        let (lot_size, source) = match (precision, min_quantity) {
            (Some(p), _) => (p, LotSizeSource::Precision),
            (None, Some(m)) => (m, LotSizeSource::MinQuantity),
            (None, None) => (DEFAULT_LOT_SIZE, LotSizeSource::Default),
        };

        Self::build(symbol, lot_size, min_quantity, contract_size, source)
    }

    /// Instrument known only by a configured fallback lot size.
    pub fn fallback(symbol: InstId, lot_size: Decimal) -> Result<Self> {
        if !is_positive(&lot_size) {
            return Err(CoreError::InvalidArgument(format!(
                "fallback lot size for {symbol} must be positive, got {lot_size}"
            )));
        }
        Ok(Self::build(symbol, lot_size, None, None, LotSizeSource::Fallback))
    }

    fn build(
        symbol: InstId,
        lot_size: Decimal,
        min_quantity: Option<Decimal>,
        contract_size: Option<Decimal>,
        source: LotSizeSource,
    ) -> Self {
        Self {
            symbol,
            lot_size: Size::new(lot_size),
            min_size: min_quantity.map(Size::new),
            contract_size: Size::new(contract_size.filter(is_positive).unwrap_or(Decimal::ONE)),
            amount_precision: amount_precision(lot_size),
            lot_size_source: source,
        }
    }

    /// Underlying-asset amount represented by `contracts`.
    pub fn underlying_amount(&self, contracts: Size) -> Size {
        contracts * self.contract_size.inner()
    }
}

fn is_positive(d: &Decimal) -> bool {
    d.is_sign_positive() && !d.is_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn eth() -> InstId {
        InstId::new("ETH-USDT-SWAP").unwrap()
    }

    #[test]
    fn test_inst_id_from_asset() {
        assert_eq!(InstId::from_asset("btc").unwrap().as_str(), "BTC-USDT-SWAP");
        assert_eq!(
            InstId::from_asset("ETH-USDT-SWAP").unwrap().as_str(),
            "ETH-USDT-SWAP"
        );
        assert_eq!(InstId::from_asset("SOL").unwrap().asset(), "SOL");
    }

    #[test]
    fn test_inst_id_rejects_blank() {
        assert!(InstId::new("  ").is_err());
        assert!(InstId::new("ETH USDT").is_err());
    }

    #[test]
    fn test_lot_size_prefers_precision_field() {
        let inst = Instrument::from_definition(eth(), Some(dec!(0.01)), Some(dec!(0.1)), Some(dec!(0.1)));
        assert_eq!(inst.lot_size.inner(), dec!(0.01));
        assert_eq!(inst.lot_size_source, LotSizeSource::Precision);
        assert_eq!(inst.amount_precision, 2);
        assert_eq!(inst.min_size, Some(Size::new(dec!(0.1))));
    }

    #[test]
    fn test_lot_size_falls_back_to_min_quantity() {
        let inst = Instrument::from_definition(eth(), None, Some(dec!(0.1)), None);
        assert_eq!(inst.lot_size.inner(), dec!(0.1));
        assert_eq!(inst.lot_size_source, LotSizeSource::MinQuantity);
        assert_eq!(inst.amount_precision, 1);
    }

    #[test]
    fn test_lot_size_default_when_fields_missing() {
        let inst = Instrument::from_definition(eth(), None, None, None);
        assert_eq!(inst.lot_size.inner(), DEFAULT_LOT_SIZE);
        assert_eq!(inst.lot_size_source, LotSizeSource::Default);
        assert_eq!(inst.amount_precision, 0);
        assert_eq!(inst.contract_size, Size::ONE);
    }

    #[test]
    fn test_zero_precision_counts_as_absent() {
        let inst = Instrument::from_definition(eth(), Some(dec!(0)), Some(dec!(1)), None);
        assert_eq!(inst.lot_size_source, LotSizeSource::MinQuantity);
        assert_eq!(inst.lot_size.inner(), dec!(1));
    }

    #[test]
    fn test_fallback_requires_positive_lot() {
        assert!(Instrument::fallback(eth(), dec!(0)).is_err());
        let inst = Instrument::fallback(eth(), dec!(1.0)).unwrap();
        assert_eq!(inst.lot_size_source, LotSizeSource::Fallback);
        assert_eq!(inst.amount_precision, 0);
    }

    #[test]
    fn test_underlying_amount() {
        let inst = Instrument::from_definition(eth(), Some(dec!(1)), None, Some(dec!(0.1)));
        assert_eq!(inst.underlying_amount(Size::new(dec!(3))).inner(), dec!(0.3));
    }
}
