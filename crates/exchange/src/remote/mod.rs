pub mod api_response;
pub mod bybit_client;
pub mod instruments_response;
pub mod order_response;
pub mod wallet_response;

pub use api_response::ApiResponse;
pub use bybit_client::BybitClient;
pub use instruments_response::{InstrumentInfo, InstrumentsPage, LotSizeFilter};
pub use order_response::{CreateOrderBody, OrderCreated, OrderResponse};
pub use wallet_response::{CoinBalance, WalletAccount, WalletBalanceResult};
