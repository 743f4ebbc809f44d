//! Order-related types and identifiers.
//!
//! Provides order side, kind, account modes, client order IDs and the
//! `OrderRequest` submitted for each leg of a decision.

use crate::quantity::NormalizedQuantity;
use crate::{InstId, Price, Size};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Position direction opened by this side (`posSide` in long/short mode).
    pub fn position_side(&self) -> &'static str {
        match self {
            Self::Buy => "long",
            Self::Sell => "short",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of order submitted for a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Immediate market entry.
    Market,
    /// Limit entry.
    Limit,
    /// Conditional close triggered above/below the entry in profit.
    TakeProfit,
    /// Conditional close triggered against the position.
    StopLoss,
}

impl OrderKind {
    /// Conditional (algo) orders are validated strictly against the lot size.
    pub fn is_conditional(&self) -> bool {
        matches!(self, Self::TakeProfit | Self::StopLoss)
    }

    pub fn leg(&self) -> OrderLeg {
        match self {
            Self::Market | Self::Limit => OrderLeg::Entry,
            Self::TakeProfit => OrderLeg::TakeProfit,
            Self::StopLoss => OrderLeg::StopLoss,
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "market"),
            Self::Limit => write!(f, "limit"),
            Self::TakeProfit => write!(f, "take_profit"),
            Self::StopLoss => write!(f, "stop_loss"),
        }
    }
}

/// Leg of a trading decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderLeg {
    Entry,
    TakeProfit,
    StopLoss,
}

impl OrderLeg {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::TakeProfit => "take_profit",
            Self::StopLoss => "stop_loss",
        }
    }
}

impl fmt::Display for OrderLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Margin mode sent as `tdMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    #[default]
    Cross,
    Isolated,
}

impl TradeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cross => "cross",
            Self::Isolated => "isolated",
        }
    }
}

/// Account position mode.
///
/// In long/short mode every order must name the position side it acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    #[default]
    #[serde(alias = "net_mode")]
    Net,
    #[serde(alias = "long_short_mode")]
    LongShort,
}

/// Client order ID for idempotency.
///
/// Every logical request carries one id for its whole life, so retries of the
/// same request cannot open a second order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create a new unique client order ID.
    ///
    /// Format: `sg{timestamp_ms}{uuid_short}`, alphanumeric only and at most
    /// 32 characters.
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid = Uuid::new_v4().simple().to_string();
        Self(format!("sg{ts}{}", &uuid[..8]))
    }

    /// Create from an existing string (for parsing responses).
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One order submission for one leg.
///
/// Built once per leg; every retry attempt resubmits the same request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: InstId,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub quantity: Size,
    /// Quantity exactly as it goes on the wire.
    pub quantity_text: String,
    pub trigger_price: Option<Price>,
    pub limit_price: Option<Price>,
    /// Direction of the position this order opens or protects.
    pub position_side: OrderSide,
    pub client_order_id: ClientOrderId,
}

impl OrderRequest {
    /// Market entry with the requested quantity, unmodified.
    pub fn market(symbol: InstId, side: OrderSide, quantity: Size) -> Self {
        Self::entry(symbol, side, OrderKind::Market, quantity, None)
    }

    /// Limit entry with the requested quantity, unmodified.
    pub fn limit(symbol: InstId, side: OrderSide, quantity: Size, price: Price) -> Self {
        Self::entry(symbol, side, OrderKind::Limit, quantity, Some(price))
    }

    fn entry(
        symbol: InstId,
        side: OrderSide,
        kind: OrderKind,
        quantity: Size,
        limit_price: Option<Price>,
    ) -> Self {
        Self {
            symbol,
            side,
            kind,
            quantity,
            quantity_text: quantity.to_wire(),
            trigger_price: None,
            limit_price,
            position_side: side,
            client_order_id: ClientOrderId::new(),
        }
    }

    /// Conditional close for a position opened with `entry_side`.
    ///
    /// The order sits on the opposite side and uses the normalized quantity.
    pub fn protective(
        symbol: InstId,
        entry_side: OrderSide,
        kind: OrderKind,
        quantity: &NormalizedQuantity,
        trigger: Price,
    ) -> Self {
        debug_assert!(kind.is_conditional());
        Self {
            symbol,
            side: entry_side.opposite(),
            kind,
            quantity: quantity.rounded,
            quantity_text: quantity.display.clone(),
            trigger_price: Some(trigger),
            limit_price: None,
            position_side: entry_side,
            client_order_id: ClientOrderId::new(),
        }
    }

    pub fn leg(&self) -> OrderLeg {
        self.kind.leg()
    }
}
