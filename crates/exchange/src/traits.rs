use async_trait::async_trait;

use common::models::{AccountType, Category, OrderRequest};

use crate::error::BybitError;
use crate::remote::{InstrumentInfo, OrderResponse, WalletAccount};

/// The three exchange calls the signal pipeline depends on.
#[async_trait]
pub trait TradingApi: Send + Sync {
    /// Full instrument catalog for a product category.
    async fn get_instruments_info(
        &self,
        category: Category,
    ) -> Result<Vec<InstrumentInfo>, BybitError>;

    /// Sub-accounts with their coin balances.
    async fn get_wallet_balance(
        &self,
        account_type: AccountType,
    ) -> Result<Vec<WalletAccount>, BybitError>;

    /// Submits an order. A rejection by the exchange is `Ok` with a non-zero
    /// `ret_code`; only transport and decoding problems are `Err`.
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderResponse, BybitError>;
}
