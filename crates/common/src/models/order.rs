use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::TradeSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Linear,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    #[serde(rename = "GTC")]
    Gtc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    #[serde(rename = "UNIFIED")]
    Unified,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unified => "UNIFIED",
        }
    }
}

/// A limit order with stop-loss and take-profit attached in the same request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    pub category: Category,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub qty: Decimal,
    pub price: Decimal,
    pub time_in_force: TimeInForce,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

impl OrderRequest {
    pub fn bracketed_buy(signal: &TradeSignal, qty: Decimal) -> Self {
        Self {
            category: Category::Linear,
            symbol: signal.symbol.clone(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            qty,
            price: signal.price,
            time_in_force: TimeInForce::Gtc,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
        }
    }
}

impl fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {:?} {} qty={} @ {} SL={} TP={} ({:?})",
            self.side,
            self.order_type,
            self.symbol,
            self.qty,
            self.price,
            self.stop_loss,
            self.take_profit,
            self.time_in_force
        )
    }
}
