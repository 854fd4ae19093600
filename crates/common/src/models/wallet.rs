use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const QUOTE_COIN: &str = "USDT";

/// Point-in-time balance of one coin in the trading account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub coin: String,
    pub wallet_balance: Decimal,
    pub equity: Decimal,
    pub usd_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentStepSize {
    pub symbol: String,
    pub qty_step: Decimal,
}
