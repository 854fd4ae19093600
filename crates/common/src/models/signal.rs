use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SYMBOL_PREFIX: &str = "Symbol:";
pub const PRICE_PREFIX: &str = "Price:";
pub const STOP_LOSS_PREFIX: &str = "Stop Loss:";
pub const TAKE_PROFIT_PREFIX: &str = "Take Profit:";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalFormatError {
    #[error("Invalid message format: missing `{0}` line")]
    MissingField(&'static str),
    #[error("Invalid message format: `{field}` value {value:?} is not a number")]
    InvalidNumber { field: &'static str, value: String },
    #[error("Invalid message format: `{field}` must be a positive number, got {value}")]
    NonPositive { field: &'static str, value: Decimal },
}

/// A long entry parsed from one signal-bot message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub symbol: String,
    pub price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

impl TradeSignal {
    /// Parses the line-oriented signal format:
    ///
    /// ```text
    /// Symbol: BTCUSDT
    /// Price: 65000.50
    /// Stop Loss: 64000
    /// Take Profit: 67000
    /// ```
    ///
    /// Surrounding double quotes and whitespace are stripped first. Prefixes are
    /// exact and case sensitive, lines may come in any order and unknown lines
    /// are ignored. When a prefix repeats, the last line wins.
    pub fn parse(raw: &str) -> Result<Self, SignalFormatError> {
        let text = raw.trim_matches('"').trim();

        let mut symbol: Option<&str> = None;
        let mut price: Option<&str> = None;
        let mut stop_loss: Option<&str> = None;
        let mut take_profit: Option<&str> = None;

        for line in text.lines() {
            if let Some(rest) = line.strip_prefix(SYMBOL_PREFIX) {
                symbol = Some(rest.trim());
            } else if let Some(rest) = line.strip_prefix(PRICE_PREFIX) {
                price = Some(rest.trim());
            } else if let Some(rest) = line.strip_prefix(STOP_LOSS_PREFIX) {
                stop_loss = Some(rest.trim());
            } else if let Some(rest) = line.strip_prefix(TAKE_PROFIT_PREFIX) {
                take_profit = Some(rest.trim());
            }
        }

        let symbol = symbol
            .filter(|s| !s.is_empty())
            .ok_or(SignalFormatError::MissingField("Symbol"))?;

        Ok(Self {
            symbol: symbol.to_string(),
            price: parse_positive("Price", price)?,
            stop_loss: parse_positive("Stop Loss", stop_loss)?,
            take_profit: parse_positive("Take Profit", take_profit)?,
        })
    }
}

fn parse_positive(field: &'static str, value: Option<&str>) -> Result<Decimal, SignalFormatError> {
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or(SignalFormatError::MissingField(field))?;

    let parsed = Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| SignalFormatError::InvalidNumber {
            field,
            value: value.to_string(),
        })?;

    if parsed <= Decimal::ZERO {
        return Err(SignalFormatError::NonPositive {
            field,
            value: parsed,
        });
    }
    Ok(parsed)
}

impl FromStr for TradeSignal {
    type Err = SignalFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", SYMBOL_PREFIX, self.symbol)?;
        writeln!(f, "{} {}", PRICE_PREFIX, self.price)?;
        writeln!(f, "{} {}", STOP_LOSS_PREFIX, self.stop_loss)?;
        write!(f, "{} {}", TAKE_PROFIT_PREFIX, self.take_profit)
    }
}
