//! Trading decision input.

use serde::{Deserialize, Serialize};
use swapguard_core::{InstId, OrderRequest, OrderSide, Price, Size, SubmissionError};

/// How the entry order is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryParams {
    #[default]
    Market,
    Limit { price: Price },
}

/// One trading decision: open a position and protect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDecision {
    pub symbol: InstId,
    pub side: OrderSide,
    /// Requested position size, sent unmodified on the entry order.
    pub raw_quantity: Size,
    pub entry: EntryParams,
    pub take_profit_trigger: Price,
    pub stop_loss_trigger: Price,
}

impl EntryDecision {
    /// Market entry.
    pub fn market(
        symbol: InstId,
        side: OrderSide,
        raw_quantity: Size,
        take_profit_trigger: Price,
        stop_loss_trigger: Price,
    ) -> Self {
        Self {
            symbol,
            side,
            raw_quantity,
            entry: EntryParams::Market,
            take_profit_trigger,
            stop_loss_trigger,
        }
    }

    #[must_use]
    pub fn with_limit_price(mut self, price: Price) -> Self {
        self.entry = EntryParams::Limit { price };
        self
    }

    /// Reject inputs that could never produce a valid order.
    pub fn validate(&self) -> Result<(), SubmissionError> {
        if !self.raw_quantity.is_positive() {
            return Err(SubmissionError::invalid_argument(format!(
                "quantity must be positive, got {}",
                self.raw_quantity
            )));
        }
        if !self.take_profit_trigger.is_positive() {
            return Err(SubmissionError::invalid_argument(format!(
                "take-profit trigger must be positive, got {}",
                self.take_profit_trigger
            )));
        }
        if !self.stop_loss_trigger.is_positive() {
            return Err(SubmissionError::invalid_argument(format!(
                "stop-loss trigger must be positive, got {}",
                self.stop_loss_trigger
            )));
        }
        if let EntryParams::Limit { price } = self.entry {
            if !price.is_positive() {
                return Err(SubmissionError::invalid_argument(format!(
                    "limit price must be positive, got {price}"
                )));
            }
        }
        Ok(())
    }

    /// Entry order with the raw quantity.
    pub fn entry_request(&self) -> OrderRequest {
        match self.entry {
            EntryParams::Market => {
                OrderRequest::market(self.symbol.clone(), self.side, self.raw_quantity)
            }
            EntryParams::Limit { price } => {
                OrderRequest::limit(self.symbol.clone(), self.side, self.raw_quantity, price)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use swapguard_core::{ErrorKind, OrderKind};

    fn decision(qty: rust_decimal::Decimal) -> EntryDecision {
        EntryDecision::market(
            InstId::new("ETH-USDT-SWAP").unwrap(),
            OrderSide::Buy,
            Size::new(qty),
            Price::new(dec!(3600)),
            Price::new(dec!(3300)),
        )
    }

    #[test]
    fn test_entry_request_keeps_raw_quantity() {
        let req = decision(dec!(0.2127)).entry_request();
        assert_eq!(req.kind, OrderKind::Market);
        assert_eq!(req.quantity_text, "0.2127");
    }

    #[test]
    fn test_limit_entry() {
        let req = decision(dec!(1))
            .with_limit_price(Price::new(dec!(3450.5)))
            .entry_request();
        assert_eq!(req.kind, OrderKind::Limit);
        assert_eq!(req.limit_price, Some(Price::new(dec!(3450.5))));
    }

    #[test]
    fn test_validate() {
        assert!(decision(dec!(0.01)).validate().is_ok());
        assert_eq!(
            decision(dec!(0)).validate().unwrap_err().kind,
            ErrorKind::InvalidArgument
        );
        assert!(decision(dec!(-1)).validate().is_err());

        let mut bad_trigger = decision(dec!(1));
        bad_trigger.stop_loss_trigger = Price::ZERO;
        assert!(bad_trigger.validate().is_err());

        let bad_limit = decision(dec!(1)).with_limit_price(Price::ZERO);
        assert!(bad_limit.validate().is_err());
    }
}
