pub mod order;
pub mod signal;
pub mod wallet;

pub use order::{AccountType, Category, OrderRequest, OrderType, Side, TimeInForce};
pub use signal::{SignalFormatError, TradeSignal};
pub use wallet::{InstrumentStepSize, QUOTE_COIN, WalletSnapshot};
