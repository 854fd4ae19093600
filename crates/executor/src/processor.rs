use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use common::models::{
    AccountType, Category, InstrumentStepSize, OrderRequest, QUOTE_COIN, SignalFormatError,
    TradeSignal, WalletSnapshot,
};
use common::sizing::compute_quantity;
use exchange::{BybitError, TradingApi};

#[derive(Error, Debug)]
pub enum RelayError {
    #[error(transparent)]
    Format(#[from] SignalFormatError),
    #[error("Symbol {0} not found in instruments")]
    SymbolNotFound(String),
    #[error("Upstream error: {0}")]
    Upstream(#[from] BybitError),
    #[error("USDT balance not found in the response")]
    BalanceNotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Placed { order_id: Option<String> },
    Rejected { code: i64, message: String },
    InsufficientBalance,
}

/// What happened to one inbound message. Fields are filled as far as the
/// pipeline got before stopping.
#[derive(Debug)]
pub struct CycleReport {
    pub signal: Option<TradeSignal>,
    pub qty: Option<Decimal>,
    pub outcome: Result<CycleOutcome, RelayError>,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Ok(CycleOutcome::Placed { .. }))
    }

    pub fn status(&self) -> String {
        match &self.outcome {
            Ok(CycleOutcome::Placed { order_id }) => match order_id {
                Some(id) => format!("placed (order {})", id),
                None => "placed".to_string(),
            },
            Ok(CycleOutcome::Rejected { code, message }) => {
                format!("rejected ({}: {})", code, message)
            }
            Ok(CycleOutcome::InsufficientBalance) => "insufficient balance".to_string(),
            Err(e) => format!("failed: {}", e),
        }
    }

    fn log(&self) {
        let symbol = self.signal.as_ref().map(|s| s.symbol.as_str()).unwrap_or("-");
        let price = self.signal.as_ref().map(|s| s.price);
        let stop_loss = self.signal.as_ref().map(|s| s.stop_loss);
        let take_profit = self.signal.as_ref().map(|s| s.take_profit);
        let status = self.status();

        match &self.outcome {
            Ok(CycleOutcome::Placed { .. }) => info!(
                symbol, qty = ?self.qty, ?price, ?stop_loss, ?take_profit, %status,
                "Limit order placed successfully with SL/TP"
            ),
            Ok(CycleOutcome::InsufficientBalance) => warn!(
                symbol, qty = ?self.qty, ?price, ?stop_loss, ?take_profit, %status,
                "Insufficient balance to place even a minimum quantity order"
            ),
            _ => error!(
                symbol, qty = ?self.qty, ?price, ?stop_loss, ?take_profit, %status,
                "Signal was not executed"
            ),
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headline = if self.is_success() { "ORDER PLACED" } else { "ORDER NOT PLACED" };
        writeln!(f, "{}: {}", headline, self.status())?;
        if let Some(signal) = &self.signal {
            writeln!(f, "Symbol: {}", signal.symbol)?;
            if let Some(qty) = self.qty {
                writeln!(f, "Qty: {}", qty)?;
            }
            writeln!(f, "Price: {}", signal.price)?;
            writeln!(f, "Stop Loss: {}", signal.stop_loss)?;
            write!(f, "Take Profit: {}", signal.take_profit)?;
        }
        Ok(())
    }
}

/// Turns one signal message into at most one bracketed limit order.
///
/// Every call reads the catalog and the wallet fresh. Nothing reserves the
/// balance between the read and the submit, so two cycles running at the same
/// time can both size against the same funds.
pub struct SignalProcessor<A> {
    api: A,
}

impl<A: TradingApi> SignalProcessor<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub async fn process(&self, raw: &str) -> CycleReport {
        let mut signal = None;
        let mut qty = None;
        let outcome = self.run(raw, &mut signal, &mut qty).await;

        let report = CycleReport {
            signal,
            qty,
            outcome,
        };
        report.log();
        report
    }

    async fn run(
        &self,
        raw: &str,
        parsed: &mut Option<TradeSignal>,
        sized: &mut Option<Decimal>,
    ) -> Result<CycleOutcome, RelayError> {
        let signal = TradeSignal::parse(raw)?;
        info!(
            "Extracted values - Symbol: {}, Price: {}, Stop Loss: {}, Take Profit: {}",
            signal.symbol, signal.price, signal.stop_loss, signal.take_profit
        );
        *parsed = Some(signal.clone());

        let step = self.resolve_step_size(&signal.symbol).await?;
        let wallet = self.resolve_balance().await?;

        let qty = compute_quantity(wallet.wallet_balance, signal.price, step.qty_step);
        *sized = Some(qty);
        if qty <= Decimal::ZERO {
            return Ok(CycleOutcome::InsufficientBalance);
        }

        let order = OrderRequest::bracketed_buy(&signal, qty);
        info!("Placing order with parameters: {}", order);

        let response = self.api.place_order(&order).await?;
        info!("Order response: {}", response.raw);
        if response.is_success() {
            Ok(CycleOutcome::Placed {
                order_id: response.order_id().map(str::to_string),
            })
        } else {
            Ok(CycleOutcome::Rejected {
                code: response.ret_code,
                message: response.ret_msg,
            })
        }
    }

    /// Quantity increment for `symbol` from the linear catalog.
    pub async fn resolve_step_size(&self, symbol: &str) -> Result<InstrumentStepSize, RelayError> {
        let instruments = self.api.get_instruments_info(Category::Linear).await?;

        let info = instruments
            .iter()
            .find(|i| i.symbol == symbol)
            .ok_or_else(|| RelayError::SymbolNotFound(symbol.to_string()))?;

        let qty_step = info
            .qty_step()?
            .filter(|step| *step > Decimal::ZERO)
            .ok_or_else(|| {
                BybitError::Malformed(format!(
                    "{} has no usable qtyStep ({:?})",
                    symbol, info.lot_size_filter.qty_step
                ))
            })?;

        Ok(InstrumentStepSize {
            symbol: symbol.to_string(),
            qty_step,
        })
    }

    /// First USDT entry across all sub-accounts of the unified wallet.
    pub async fn resolve_balance(&self) -> Result<WalletSnapshot, RelayError> {
        let accounts = self.api.get_wallet_balance(AccountType::Unified).await?;
        debug!("Wallet balance response: {:?}", accounts);

        let snapshot = accounts
            .iter()
            .flat_map(|account| account.coin.iter())
            .find(|coin| coin.coin == QUOTE_COIN)
            .ok_or(RelayError::BalanceNotFound)?
            .to_snapshot()?;

        info!(
            "{} Equity: {}, Wallet Balance: {}, USD Value: {}",
            QUOTE_COIN, snapshot.equity, snapshot.wallet_balance, snapshot.usd_value
        );
        Ok(snapshot)
    }
}
